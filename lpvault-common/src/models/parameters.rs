//! Per-user strategy parameters.
//!
//! A user selects one of the predefined [`Template`]s and may override individual groups of
//! fields. Which fields are overridden is tracked by a customization bitmap with one bit per
//! [`ParameterField`]; a field whose bit is cleared always resolves to the template constant.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::CoreError;

/// Upper bound of every basis-point field.
pub const MAX_BPS: u32 = 10_000;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Template {
    /// No explicit choice, getters fall back to [`Template::Moderate`].
    #[default]
    None,
    Conservative,
    Moderate,
    Aggressive,
}

impl Template {
    /// The template whose constants back a user's non-overridden fields.
    pub fn effective(self) -> Template {
        match self {
            Template::None => Template::Moderate,
            other => other,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OracleSource {
    #[default]
    Dex,
    Chainlink,
    Twap,
}

/// Every overridable field, the discriminant is its bit in the customization bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "camelCase")]
#[repr(u8)]
pub enum ParameterField {
    TargetRangeUpper = 0,
    TargetRangeLower = 1,
    RebalanceThresholdUpper = 2,
    RebalanceThresholdLower = 3,
    FeeReinvestment = 4,
    ReinvestmentTrigger = 5,
    ReinvestmentRatio = 6,
    MaxSlippage = 7,
    EmergencyExitTrigger = 8,
    MaxVaultUtilization = 9,
    AdaptiveRanges = 10,
    RebalanceCountThresholdHigh = 11,
    RebalanceCountThresholdLow = 12,
    AdaptiveTimeframeHigh = 13,
    AdaptiveTimeframeLow = 14,
    RangeAdjustmentPercentHigh = 15,
    ThresholdAdjustmentPercentHigh = 16,
    RangeAdjustmentPercentLow = 17,
    ThresholdAdjustmentPercentLow = 18,
    OracleSource = 19,
    PriceDeviationTolerance = 20,
}

impl ParameterField {
    pub fn bit(self) -> u32 {
        1u32 << (self as u8)
    }
}

/// Fields are written group-wise, a group setter always sets all of its bits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParameterGroup {
    Range,
    Fee,
    Risk,
    Adaptive,
    Oracle,
}

impl ParameterGroup {
    pub fn fields(self) -> &'static [ParameterField] {
        use ParameterField::*;
        match self {
            ParameterGroup::Range => &[
                TargetRangeUpper,
                TargetRangeLower,
                RebalanceThresholdUpper,
                RebalanceThresholdLower,
            ],
            ParameterGroup::Fee => &[FeeReinvestment, ReinvestmentTrigger, ReinvestmentRatio],
            ParameterGroup::Risk => &[MaxSlippage, EmergencyExitTrigger, MaxVaultUtilization],
            ParameterGroup::Adaptive => &[
                AdaptiveRanges,
                RebalanceCountThresholdHigh,
                RebalanceCountThresholdLow,
                AdaptiveTimeframeHigh,
                AdaptiveTimeframeLow,
                RangeAdjustmentPercentHigh,
                ThresholdAdjustmentPercentHigh,
                RangeAdjustmentPercentLow,
                ThresholdAdjustmentPercentLow,
            ],
            ParameterGroup::Oracle => &[ParameterField::OracleSource, PriceDeviationTolerance],
        }
    }

    pub fn mask(self) -> u32 {
        self.fields()
            .iter()
            .fold(0, |mask, field| mask | field.bit())
    }
}

fn check_bps(field: &'static str, value: u32) -> Result<(), CoreError> {
    if value > MAX_BPS {
        return Err(CoreError::invalid_parameter(
            field,
            format!("{value} exceeds {MAX_BPS} basis points"),
        ));
    }
    Ok(())
}

fn check_non_zero(field: &'static str, value: u32) -> Result<(), CoreError> {
    if value == 0 {
        return Err(CoreError::invalid_parameter(field, "must not be zero"));
    }
    Ok(())
}

/// Position range around the current price and the drift that triggers a rebalance, all in
/// basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParameters {
    pub target_range_upper: u32,
    pub target_range_lower: u32,
    pub rebalance_threshold_upper: u32,
    pub rebalance_threshold_lower: u32,
}

impl RangeParameters {
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, value) in [
            ("targetRangeUpper", self.target_range_upper),
            ("targetRangeLower", self.target_range_lower),
            ("rebalanceThresholdUpper", self.rebalance_threshold_upper),
            ("rebalanceThresholdLower", self.rebalance_threshold_lower),
        ] {
            check_non_zero(field, value)?;
            check_bps(field, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeParameters {
    pub fee_reinvestment: bool,
    /// Accrued fee value, in USD cents, above which fees are reinvested.
    pub reinvestment_trigger: u64,
    pub reinvestment_ratio: u32,
}

impl FeeParameters {
    pub fn validate(&self) -> Result<(), CoreError> {
        check_bps("reinvestmentRatio", self.reinvestment_ratio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskParameters {
    pub max_slippage: u32,
    pub emergency_exit_trigger: u32,
    pub max_vault_utilization: u32,
}

impl RiskParameters {
    pub fn validate(&self) -> Result<(), CoreError> {
        check_bps("maxSlippage", self.max_slippage)?;
        check_bps("emergencyExitTrigger", self.emergency_exit_trigger)?;
        check_bps("maxVaultUtilization", self.max_vault_utilization)
    }
}

/// Widening/narrowing of the range depending on how often positions were rebalanced
/// recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveParameters {
    pub adaptive_ranges: bool,
    pub rebalance_count_threshold_high: u32,
    pub rebalance_count_threshold_low: u32,
    /// Days.
    pub adaptive_timeframe_high: u32,
    /// Days.
    pub adaptive_timeframe_low: u32,
    pub range_adjustment_percent_high: u32,
    pub threshold_adjustment_percent_high: u32,
    pub range_adjustment_percent_low: u32,
    pub threshold_adjustment_percent_low: u32,
}

impl AdaptiveParameters {
    pub fn validate(&self) -> Result<(), CoreError> {
        check_non_zero("adaptiveTimeframeHigh", self.adaptive_timeframe_high)?;
        check_non_zero("adaptiveTimeframeLow", self.adaptive_timeframe_low)?;
        check_bps("rangeAdjustmentPercentHigh", self.range_adjustment_percent_high)?;
        check_bps("thresholdAdjustmentPercentHigh", self.threshold_adjustment_percent_high)?;
        check_bps("rangeAdjustmentPercentLow", self.range_adjustment_percent_low)?;
        check_bps("thresholdAdjustmentPercentLow", self.threshold_adjustment_percent_low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleParameters {
    pub oracle_source: OracleSource,
    pub price_deviation_tolerance: u32,
}

impl OracleParameters {
    pub fn validate(&self) -> Result<(), CoreError> {
        check_bps("priceDeviationTolerance", self.price_deviation_tolerance)
    }
}

/// Every field of every group, either resolved for a user or as a template table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyParameters {
    pub range: RangeParameters,
    pub fee: FeeParameters,
    pub risk: RiskParameters,
    pub adaptive: AdaptiveParameters,
    pub oracle: OracleParameters,
}
