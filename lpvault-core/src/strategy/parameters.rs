//! Per-user strategy parameters.
//!
//! Every user starts without a template and without overrides, which resolves to the moderate
//! table. Overrides are written one group at a time and are only authoritative while their
//! bits are set in the user's customization bitmap.

use std::collections::HashMap;

use alloy_primitives::Address;
use lpvault_common::{
    calls::ParameterCall,
    events::Event,
    models::parameters::{
        AdaptiveParameters, FeeParameters, OracleParameters, ParameterField, ParameterGroup,
        RangeParameters, RiskParameters, StrategyParameters, Template,
    },
    traits::Host,
    CoreError, ReturnData,
};
use tracing::debug;

use super::templates::template_defaults;
use crate::chain::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserParameters {
    pub template: Template,
    pub bitmap: u32,
    /// Last written overrides; only fields whose bit is set are read back.
    values: StrategyParameters,
}

impl UserParameters {
    fn pick<T>(&self, field: ParameterField, stored: T, default: T) -> T {
        if self.bitmap & field.bit() != 0 {
            stored
        } else {
            default
        }
    }

    pub fn range(&self) -> RangeParameters {
        use ParameterField::*;
        let stored = &self.values.range;
        let default = &template_defaults(self.template).range;
        RangeParameters {
            target_range_upper: self.pick(
                TargetRangeUpper,
                stored.target_range_upper,
                default.target_range_upper,
            ),
            target_range_lower: self.pick(
                TargetRangeLower,
                stored.target_range_lower,
                default.target_range_lower,
            ),
            rebalance_threshold_upper: self.pick(
                RebalanceThresholdUpper,
                stored.rebalance_threshold_upper,
                default.rebalance_threshold_upper,
            ),
            rebalance_threshold_lower: self.pick(
                RebalanceThresholdLower,
                stored.rebalance_threshold_lower,
                default.rebalance_threshold_lower,
            ),
        }
    }

    pub fn fee(&self) -> FeeParameters {
        use ParameterField::*;
        let stored = &self.values.fee;
        let default = &template_defaults(self.template).fee;
        FeeParameters {
            fee_reinvestment: self.pick(
                FeeReinvestment,
                stored.fee_reinvestment,
                default.fee_reinvestment,
            ),
            reinvestment_trigger: self.pick(
                ReinvestmentTrigger,
                stored.reinvestment_trigger,
                default.reinvestment_trigger,
            ),
            reinvestment_ratio: self.pick(
                ReinvestmentRatio,
                stored.reinvestment_ratio,
                default.reinvestment_ratio,
            ),
        }
    }

    pub fn risk(&self) -> RiskParameters {
        use ParameterField::*;
        let stored = &self.values.risk;
        let default = &template_defaults(self.template).risk;
        RiskParameters {
            max_slippage: self.pick(MaxSlippage, stored.max_slippage, default.max_slippage),
            emergency_exit_trigger: self.pick(
                EmergencyExitTrigger,
                stored.emergency_exit_trigger,
                default.emergency_exit_trigger,
            ),
            max_vault_utilization: self.pick(
                MaxVaultUtilization,
                stored.max_vault_utilization,
                default.max_vault_utilization,
            ),
        }
    }

    pub fn adaptive(&self) -> AdaptiveParameters {
        use ParameterField::*;
        let stored = &self.values.adaptive;
        let default = &template_defaults(self.template).adaptive;
        AdaptiveParameters {
            adaptive_ranges: self.pick(
                AdaptiveRanges,
                stored.adaptive_ranges,
                default.adaptive_ranges,
            ),
            rebalance_count_threshold_high: self.pick(
                RebalanceCountThresholdHigh,
                stored.rebalance_count_threshold_high,
                default.rebalance_count_threshold_high,
            ),
            rebalance_count_threshold_low: self.pick(
                RebalanceCountThresholdLow,
                stored.rebalance_count_threshold_low,
                default.rebalance_count_threshold_low,
            ),
            adaptive_timeframe_high: self.pick(
                AdaptiveTimeframeHigh,
                stored.adaptive_timeframe_high,
                default.adaptive_timeframe_high,
            ),
            adaptive_timeframe_low: self.pick(
                AdaptiveTimeframeLow,
                stored.adaptive_timeframe_low,
                default.adaptive_timeframe_low,
            ),
            range_adjustment_percent_high: self.pick(
                RangeAdjustmentPercentHigh,
                stored.range_adjustment_percent_high,
                default.range_adjustment_percent_high,
            ),
            threshold_adjustment_percent_high: self.pick(
                ThresholdAdjustmentPercentHigh,
                stored.threshold_adjustment_percent_high,
                default.threshold_adjustment_percent_high,
            ),
            range_adjustment_percent_low: self.pick(
                RangeAdjustmentPercentLow,
                stored.range_adjustment_percent_low,
                default.range_adjustment_percent_low,
            ),
            threshold_adjustment_percent_low: self.pick(
                ThresholdAdjustmentPercentLow,
                stored.threshold_adjustment_percent_low,
                default.threshold_adjustment_percent_low,
            ),
        }
    }

    pub fn oracle(&self) -> OracleParameters {
        let stored = &self.values.oracle;
        let default = &template_defaults(self.template).oracle;
        OracleParameters {
            oracle_source: self.pick(
                ParameterField::OracleSource,
                stored.oracle_source,
                default.oracle_source,
            ),
            price_deviation_tolerance: self.pick(
                ParameterField::PriceDeviationTolerance,
                stored.price_deviation_tolerance,
                default.price_deviation_tolerance,
            ),
        }
    }

    /// Every field resolved on its own.
    pub fn resolved(&self) -> StrategyParameters {
        StrategyParameters {
            range: self.range(),
            fee: self.fee(),
            risk: self.risk(),
            adaptive: self.adaptive(),
            oracle: self.oracle(),
        }
    }

    fn customize(&mut self, group: ParameterGroup) {
        self.bitmap |= group.mask();
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    users: HashMap<Address, UserParameters>,
}

impl ParameterStore {
    /// Users without an entry resolve like a fresh entry.
    pub fn user(&self, user: Address) -> UserParameters {
        self.users
            .get(&user)
            .copied()
            .unwrap_or_default()
    }

    fn user_mut(&mut self, user: Address) -> &mut UserParameters {
        self.users.entry(user).or_default()
    }
}

fn state<'a>(frame: &'a Frame<'_>) -> Result<&'a ParameterStore, CoreError> {
    let this = frame.address();
    frame
        .world()
        .parameters(this)
        .ok_or(CoreError::NoCode { address: this, call: "parameters".to_string() })
}

fn state_mut<'a>(frame: &'a mut Frame<'_>) -> Result<&'a mut ParameterStore, CoreError> {
    let this = frame.address();
    frame
        .world_mut()
        .parameters_mut(this)
        .ok_or(CoreError::NoCode { address: this, call: "parameters".to_string() })
}

/// Writes `group` for the caller after `write` stored its values.
fn set_group(
    frame: &mut Frame<'_>,
    group: ParameterGroup,
    write: impl FnOnce(&mut StrategyParameters),
) -> Result<ReturnData, CoreError> {
    let user = frame.caller();
    let entry = state_mut(frame)?.user_mut(user);
    write(&mut entry.values);
    entry.customize(group);
    debug!(%user, %group, bitmap = entry.bitmap, "Parameters customized");
    frame.emit(Event::ParametersCustomized { user, group });
    Ok(ReturnData::Empty)
}

pub(crate) fn handle(frame: &mut Frame<'_>, call: ParameterCall) -> Result<ReturnData, CoreError> {
    let caller = frame.caller();
    match call {
        ParameterCall::SelectTemplate(template) => {
            let entry = state_mut(frame)?.user_mut(caller);
            entry.template = template;
            entry.bitmap = 0;
            frame.emit(Event::TemplateSelected { user: caller, template });
            Ok(ReturnData::Empty)
        }
        ParameterCall::SetRangeParameters(range) => {
            range.validate()?;
            set_group(frame, ParameterGroup::Range, |values| values.range = range)
        }
        ParameterCall::SetFeeParameters(fee) => {
            fee.validate()?;
            set_group(frame, ParameterGroup::Fee, |values| values.fee = fee)
        }
        ParameterCall::SetRiskParameters(risk) => {
            risk.validate()?;
            set_group(frame, ParameterGroup::Risk, |values| values.risk = risk)
        }
        ParameterCall::SetAdaptiveParameters(adaptive) => {
            adaptive.validate()?;
            set_group(frame, ParameterGroup::Adaptive, |values| values.adaptive = adaptive)
        }
        ParameterCall::SetOracleParameters(oracle) => {
            oracle.validate()?;
            set_group(frame, ParameterGroup::Oracle, |values| values.oracle = oracle)
        }
        ParameterCall::ResetToTemplate => {
            let entry = state_mut(frame)?.user_mut(caller);
            entry.bitmap = 0;
            let template = entry.template;
            frame.emit(Event::ParametersReset { user: caller, template });
            Ok(ReturnData::Empty)
        }
        ParameterCall::ResetAll => {
            state_mut(frame)?.users.remove(&caller);
            frame.emit(Event::ParametersReset { user: caller, template: Template::None });
            Ok(ReturnData::Empty)
        }
        ParameterCall::GetAllParameters(user) => Ok(ReturnData::Parameters(Box::new(
            state(frame)?.user(user).resolved(),
        ))),
        ParameterCall::GetRangeParameters(user) => Ok(ReturnData::Range(state(frame)?.user(user).range())),
        ParameterCall::GetFeeParameters(user) => Ok(ReturnData::Fee(state(frame)?.user(user).fee())),
        ParameterCall::GetRiskParameters(user) => Ok(ReturnData::Risk(state(frame)?.user(user).risk())),
        ParameterCall::GetAdaptiveParameters(user) => {
            Ok(ReturnData::Adaptive(state(frame)?.user(user).adaptive()))
        }
        ParameterCall::GetOracleParameters(user) => Ok(ReturnData::Oracle(state(frame)?.user(user).oracle())),
        ParameterCall::GetSelectedTemplate(user) => {
            Ok(ReturnData::Template(state(frame)?.user(user).template))
        }
        ParameterCall::GetCustomizationBitmap(user) => {
            Ok(ReturnData::Bitmap(state(frame)?.user(user).bitmap))
        }
        ParameterCall::GetTemplateDefaults(template) => {
            Ok(ReturnData::Parameters(Box::new(*template_defaults(template))))
        }
    }
}
