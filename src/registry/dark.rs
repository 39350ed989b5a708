// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Dark exposure preparation

use super::{TaskFamily, TaskSchema};

pub const DARK_TASK: &str = "lsst.cp.pipe.cpDarkTask.CpDarkTask";

pub struct DarkFamily;

impl TaskFamily for DarkFamily {
    fn name(&self) -> &'static str {
        "dark"
    }

    fn schemas(&self) -> Vec<TaskSchema> {
        vec![TaskSchema::new(DARK_TASK)
            .describe("Repair cosmic rays on ISR-processed darks before combination")
            .float("psfFwhm", 3.0)
            .int("psfSize", 21)
            .int("crGrow", 2)
            .flag("repair.doInterpolate", true)
            .flag("repair.doCosmicRay", true)
            .input("inputExp", "cpDarkISR")
            .output("outputExp", "cpDarkProc")]
    }
}
