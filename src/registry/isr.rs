// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Instrument signature removal

use super::{TaskFamily, TaskSchema};

pub const ISR_TASK: &str = "lsst.ip.isr.isrTask.IsrTask";

const OVERSCAN_FIT_TYPES: &[&str] = &[
    "POLY",
    "CHEB",
    "LEG",
    "NATURAL_SPLINE",
    "CUBIC_SPLINE",
    "AKIMA_SPLINE",
    "MEAN",
    "MEANCLIP",
    "MEDIAN",
    "MEDIAN_PER_ROW",
];

/// The ISR task, shared by every calibration pipeline as its first stage
pub struct IsrFamily;

impl TaskFamily for IsrFamily {
    fn name(&self) -> &'static str {
        "isr"
    }

    fn schemas(&self) -> Vec<TaskSchema> {
        vec![TaskSchema::new(ISR_TASK)
            .describe("Remove the instrument signature from raw exposures")
            .flag("doOverscan", true)
            .flag("doAssembleCcd", true)
            .flag("doBias", true)
            .flag("doVariance", true)
            .flag("doLinearize", true)
            .flag("doCrosstalk", false)
            .flag("doDefect", true)
            .flag("doNanMasking", true)
            .flag("doInterpolate", true)
            .flag("doSaturation", true)
            .flag("doSaturationInterpolation", true)
            .flag("doSuspect", false)
            .flag("doSetBadRegions", true)
            .flag("doBrighterFatter", false)
            .flag("doDark", true)
            .flag("doFlat", true)
            .flag("doApplyGains", false)
            .flag("doFringe", true)
            .flag("doWidenSaturationTrails", true)
            .flag("doWrite", true)
            .choice("overscan.fitType", OVERSCAN_FIT_TYPES, "MEDIAN_PER_ROW")
            .int("overscan.order", 1)
            .float("overscan.numSigmaClip", 3.0)
            .int("growSaturationFootprintSize", 1)
            .string("saturatedMaskName", "SAT")
            .list("maskListToInterpolate", &[], vec!["SAT", "BAD"])
            .input("ccdExposure", "raw")
            .input("camera", "camera")
            .input_if("bias", "bias", "doBias")
            .input_if("dark", "dark", "doDark")
            .input_if("flat", "flat", "doFlat")
            .input_if("defects", "defects", "doDefect")
            .input_if("linearizer", "linearizer", "doLinearize")
            .input_if("crosstalk", "crosstalk", "doCrosstalk")
            .input_if("bfKernel", "bfKernel", "doBrighterFatter")
            .input_if("fringes", "fringe", "doFringe")
            .output("outputExposure", "postISRCCD")]
    }
}
