// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 calflow contributors

//! Photon transfer curve extraction, fitting and measurement

use super::{TaskFamily, TaskSchema};

pub const PTC_EXTRACT_TASK: &str = "lsst.cp.pipe.ptc.PhotonTransferCurveExtractTask";
pub const PTC_SOLVE_TASK: &str = "lsst.cp.pipe.ptc.PhotonTransferCurveSolveTask";
pub const PTC_MEASURE_TASK: &str = "lsst.cp.pipe.ptc.MeasurePhotonTransferCurveTask";

const FIT_TYPES: &[&str] = &["POLYNOMIAL", "EXPAPPROXIMATION", "FULLCOVARIANCE"];
const PTC_MASKS: &[&str] = &["SUSPECT", "BAD", "NO_DATA", "SAT"];

/// Tasks building photon transfer curves from flat pairs
pub struct PtcFamily;

impl PtcFamily {
    fn extract() -> TaskSchema {
        TaskSchema::new(PTC_EXTRACT_TASK)
            .describe("Measure means and covariances of flat-pair differences")
            .flag("matchByExposureId", false)
            .int("maximumRangeCovariancesAstier", 8)
            .flag("covAstierRealSpace", false)
            .int("binSize", 1)
            .int("minNumberGoodPixelsForCovariance", 10000)
            .list("maskNameList", PTC_MASKS, vec!["SUSPECT", "BAD", "NO_DATA", "SAT"])
            .float("nSigmaClipPtc", 5.5)
            .int("nIterSigmaClipPtc", 3)
            .choice("detectorMeasurementRegion", &["AMP", "FULL"], "AMP")
            .flag("doGain", true)
            .int("numEdgeSuspect", 0)
            .choice("edgeMaskLevel", &["DETECTOR", "AMP"], "DETECTOR")
            .flag("doExtractPhotodiodeData", false)
            .input("inputExp", "ptcInputExposurePairs")
            .input_if("inputPhotodiodeData", "photodiode", "doExtractPhotodiodeData")
            .output("outputCovariances", "ptcCovariances")
    }

    fn solve() -> TaskSchema {
        TaskSchema::new(PTC_SOLVE_TASK)
            .describe("Fit the photon transfer curve to the extracted covariances")
            .choice("ptcFitType", FIT_TYPES, "POLYNOMIAL")
            .int("maximumRangeCovariancesAstier", 8)
            .int("maximumRangeCovariancesAstierFullCovFit", 8)
            .float("sigmaClipFullFitCovariancesAstier", 5.0)
            .int("maxIterFullFitCovariancesAstier", 3)
            .int("polynomialFitDegree", 3)
            .float("sigmaCutPtcOutliers", 5.0)
            .int("maxIterationsPtcOutliers", 2)
            .float("minVarPivotSearch", 10000.0)
            .float("maxSignalInitialPtcOutlierFit", 50000.0)
            .flag("doFitBootstrap", false)
            .flag("doLegacyTurnoffSelection", false)
            .input("inputCovariances", "ptcCovariances")
            .input("camera", "camera")
            .output("outputPtcDataset", "ptcDatsetProposal")
    }

    /// Single-step measurement task driven from the command line; it has no
    /// connections and only contributes options
    fn measure() -> TaskSchema {
        TaskSchema::new(PTC_MEASURE_TASK)
            .describe("Measure and fit the photon transfer curve in one step")
            .string("ccdKey", "ccd")
            .choice("ptcFitType", FIT_TYPES, "POLYNOMIAL")
            .float("sigmaClipFullFitCovariancesAstier", 5.0)
            .int("maxIterFullFitCovariancesAstier", 3)
            .int("maximumRangeCovariancesAstier", 8)
            .flag("covAstierRealSpace", false)
            .int("polynomialFitDegree", 3)
            .flag("doCreateLinearizer", false)
            .int("binSize", 1)
            .float("minMeanSignal", 0.0)
            .float("maxMeanSignal", 9e6)
            .float("initialNonLinearityExclusionThresholdPositive", 0.12)
            .float("initialNonLinearityExclusionThresholdNegative", 0.25)
            .float("sigmaCutPtcOutliers", 5.0)
            .list("maskNameList", &[], vec!["SUSPECT", "BAD", "NO_DATA"])
            .float("nSigmaClipPtc", 5.5)
            .int("nIterSigmaClipPtc", 1)
            .int("maxIterationsPtcOutliers", 2)
            .flag("doFitBootstrap", false)
            .flag("doPhotodiode", true)
            .string("photodiodeDataPath", "")
            .string("instrumentName", "")
    }
}

impl TaskFamily for PtcFamily {
    fn name(&self) -> &'static str {
        "ptc"
    }

    fn schemas(&self) -> Vec<TaskSchema> {
        vec![Self::extract(), Self::solve(), Self::measure()]
    }
}
