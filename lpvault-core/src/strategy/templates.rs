use lpvault_common::models::parameters::{
    AdaptiveParameters, FeeParameters, OracleParameters, OracleSource, RangeParameters,
    RiskParameters, StrategyParameters, Template,
};

pub const CONSERVATIVE: StrategyParameters = StrategyParameters {
    range: RangeParameters {
        target_range_upper: 500,
        target_range_lower: 500,
        rebalance_threshold_upper: 150,
        rebalance_threshold_lower: 150,
    },
    fee: FeeParameters { fee_reinvestment: true, reinvestment_trigger: 5_000, reinvestment_ratio: 8_000 },
    risk: RiskParameters { max_slippage: 50, emergency_exit_trigger: 1_500, max_vault_utilization: 6_000 },
    adaptive: AdaptiveParameters {
        adaptive_ranges: true,
        rebalance_count_threshold_high: 3,
        rebalance_count_threshold_low: 1,
        adaptive_timeframe_high: 7,
        adaptive_timeframe_low: 7,
        range_adjustment_percent_high: 2_000,
        threshold_adjustment_percent_high: 1_500,
        range_adjustment_percent_low: 2_000,
        threshold_adjustment_percent_low: 1_500,
    },
    oracle: OracleParameters { oracle_source: OracleSource::Chainlink, price_deviation_tolerance: 100 },
};

pub const MODERATE: StrategyParameters = StrategyParameters {
    range: RangeParameters {
        target_range_upper: 300,
        target_range_lower: 300,
        rebalance_threshold_upper: 100,
        rebalance_threshold_lower: 100,
    },
    fee: FeeParameters { fee_reinvestment: true, reinvestment_trigger: 2_500, reinvestment_ratio: 9_000 },
    risk: RiskParameters { max_slippage: 100, emergency_exit_trigger: 2_000, max_vault_utilization: 8_000 },
    adaptive: AdaptiveParameters {
        adaptive_ranges: true,
        rebalance_count_threshold_high: 3,
        rebalance_count_threshold_low: 1,
        adaptive_timeframe_high: 7,
        adaptive_timeframe_low: 7,
        range_adjustment_percent_high: 3_000,
        threshold_adjustment_percent_high: 2_000,
        range_adjustment_percent_low: 3_000,
        threshold_adjustment_percent_low: 2_000,
    },
    oracle: OracleParameters { oracle_source: OracleSource::Dex, price_deviation_tolerance: 300 },
};

pub const AGGRESSIVE: StrategyParameters = StrategyParameters {
    range: RangeParameters {
        target_range_upper: 100,
        target_range_lower: 100,
        rebalance_threshold_upper: 50,
        rebalance_threshold_lower: 50,
    },
    fee: FeeParameters { fee_reinvestment: true, reinvestment_trigger: 1_000, reinvestment_ratio: 10_000 },
    risk: RiskParameters { max_slippage: 300, emergency_exit_trigger: 3_000, max_vault_utilization: 10_000 },
    adaptive: AdaptiveParameters {
        adaptive_ranges: true,
        rebalance_count_threshold_high: 5,
        rebalance_count_threshold_low: 1,
        adaptive_timeframe_high: 3,
        adaptive_timeframe_low: 7,
        range_adjustment_percent_high: 5_000,
        threshold_adjustment_percent_high: 3_000,
        range_adjustment_percent_low: 5_000,
        threshold_adjustment_percent_low: 3_000,
    },
    oracle: OracleParameters { oracle_source: OracleSource::Dex, price_deviation_tolerance: 500 },
};

/// Constant table backing `template`; `None` resolves to the moderate table.
pub fn template_defaults(template: Template) -> &'static StrategyParameters {
    match template.effective() {
        Template::Conservative => &CONSERVATIVE,
        Template::Aggressive => &AGGRESSIVE,
        Template::Moderate | Template::None => &MODERATE,
    }
}
