use serde::{Deserialize, Serialize};

/// Ordered list of derived feature names.
/// This order MUST match the order produced by `FeatureVector::to_array`.
/// Any change here is a breaking change for persisted models.
pub const FEATURE_NAMES: &[&str] = &[
    "ma5",
    "ma10",
    "ma20",
    "volatility10",
    "roc5",
    "roc10",
    "ema5",
    "ema10",
    "macd",
    "dow_sin",
    "dow_cos",
    "dom_sin",
    "dom_cos",
    "iv_diff1",
    "iv_diff5",
    "iv_max5",
    "iv_min5",
    "vol_change",
];

pub const FEATURE_COUNT: usize = 18;

/// Technical features for one date, computed from values up to that date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub ma5: f64,
    pub ma10: f64,
    pub ma20: f64,
    pub volatility10: f64,
    pub roc5: f64,
    pub roc10: f64,
    pub ema5: f64,
    pub ema10: f64,
    pub macd: f64,
    pub dow_sin: f64,
    pub dow_cos: f64,
    pub dom_sin: f64,
    pub dom_cos: f64,
    pub iv_diff1: f64,
    pub iv_diff5: f64,
    pub iv_max5: f64,
    pub iv_min5: f64,
    pub vol_change: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.ma5,
            self.ma10,
            self.ma20,
            self.volatility10,
            self.roc5,
            self.roc10,
            self.ema5,
            self.ema10,
            self.macd,
            self.dow_sin,
            self.dow_cos,
            self.dom_sin,
            self.dom_cos,
            self.iv_diff1,
            self.iv_diff5,
            self.iv_max5,
            self.iv_min5,
            self.vol_change,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [
            ma5,
            ma10,
            ma20,
            volatility10,
            roc5,
            roc10,
            ema5,
            ema10,
            macd,
            dow_sin,
            dow_cos,
            dom_sin,
            dom_cos,
            iv_diff1,
            iv_diff5,
            iv_max5,
            iv_min5,
            vol_change,
        ] = values;
        Self {
            ma5,
            ma10,
            ma20,
            volatility10,
            roc5,
            roc10,
            ema5,
            ema10,
            macd,
            dow_sin,
            dow_cos,
            dom_sin,
            dom_cos,
            iv_diff1,
            iv_diff5,
            iv_max5,
            iv_min5,
            vol_change,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Model input row: the trailing raw window followed by the derived features.
pub fn input_row(window: &[f64], features: &FeatureVector) -> Vec<f64> {
    let mut row = Vec::with_capacity(window.len() + FEATURE_COUNT);
    row.extend_from_slice(window);
    row.extend_from_slice(&features.to_array());
    row
}

/// Column names for `input_row`. Lags are numbered oldest first (`iv_1`).
pub fn input_column_names(window_size: usize) -> Vec<String> {
    (1..=window_size)
        .map(|i| format!("iv_{}", i))
        .chain(FEATURE_NAMES.iter().map(|name| name.to_string()))
        .collect()
}
