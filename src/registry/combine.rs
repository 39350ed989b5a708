// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Calibration combination (stacking)

use super::{TaskFamily, TaskSchema};

pub const COMBINE_TASK: &str = "lsst.cp.pipe.cpCombine.CalibCombineTask";
pub const COMBINE_BY_FILTER_TASK: &str = "lsst.cp.pipe.cpCombine.CalibCombineByFilterTask";

const SCALINGS: &[&str] = &["Unity", "ExposureTime", "DarkTime", "MeanStats", "InputList"];
const STATISTICS: &[&str] = &["MEAN", "MEDIAN", "MEANCLIP"];

fn combine_schema(identifier: &str, description: &str) -> TaskSchema {
    TaskSchema::new(identifier)
        .describe(description)
        .string("calibrationType", "unknown")
        .choice("exposureScaling", SCALINGS, "Unity")
        .choice("scalingLevel", &["DETECTOR", "AMP"], "DETECTOR")
        .int("maxVisitsToCalcErrorFromInputVariance", 5)
        .flag("doVignette", false)
        .choice("combine", STATISTICS, "MEANCLIP")
        .float("clip", 3.0)
        .int("nIter", 3)
        .list("mask", &[], vec!["SAT", "DETECTED", "INTRP"])
        .choice("stats.stat", STATISTICS, "MEANCLIP")
        .float("stats.clip", 3.0)
        .int("stats.nIter", 3)
        .input("inputExps", "cpInputs")
        .input("camera", "camera")
        .output("outputData", "cpProposal")
}

/// Combine tasks that stack processed exposures into a calibration
pub struct CombineFamily;

impl TaskFamily for CombineFamily {
    fn name(&self) -> &'static str {
        "combine"
    }

    fn schemas(&self) -> Vec<TaskSchema> {
        vec![
            combine_schema(COMBINE_TASK, "Combine processed exposures into a calibration"),
            combine_schema(
                COMBINE_BY_FILTER_TASK,
                "Combine processed exposures per filter, applying per-exposure scales",
            )
            .input("inputScales", "cpFlatNormScales"),
        ]
    }
}
