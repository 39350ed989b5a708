// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Flat statistics measurement and normalization

use super::{TaskFamily, TaskSchema};

pub const FLAT_MEASURE_TASK: &str = "lsst.cp.pipe.cpFlatNormTask.CpFlatMeasureTask";
pub const FLAT_NORMALIZE_TASK: &str = "lsst.cp.pipe.cpFlatNormTask.CpFlatNormalizationTask";

const FLAT_MASKS: &[&str] = &["BAD", "CR", "DETECTED", "INTRP", "NO_DATA", "SAT", "SUSPECT"];

pub struct FlatFamily;

impl TaskFamily for FlatFamily {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn schemas(&self) -> Vec<TaskSchema> {
        vec![
            TaskSchema::new(FLAT_MEASURE_TASK)
                .describe("Measure per-amplifier statistics of processed flats")
                .list("maskNameList", FLAT_MASKS, vec!["BAD", "CR", "DETECTED", "INTRP", "NO_DATA", "SAT", "SUSPECT"])
                .flag("doVignette", false)
                .float("numSigmaClip", 3.0)
                .int("clipMaxIter", 3)
                .input("inputExp", "postISRCCD")
                .output("outputStats", "flatStats"),
            TaskSchema::new(FLAT_NORMALIZE_TASK)
                .describe("Solve for per-exposure, per-detector flat scales")
                .choice("level", &["DETECTOR", "AMP"], "AMP")
                .int("scaleMaxIter", 10)
                .input("inputMDs", "flatStats")
                .output("outputScales", "cpFlatNormScales"),
        ]
    }
}
