use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Security type of a watched underlying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityType {
    /// Equity / ETF.
    Stk,
    /// Future.
    Fut,
    /// Index.
    Ind,
}

impl std::fmt::Display for SecurityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stk => write!(f, "STK"),
            Self::Fut => write!(f, "FUT"),
            Self::Ind => write!(f, "IND"),
        }
    }
}

/// A tradable underlying as routed at the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub security_type: SecurityType,
    pub exchange: String,
    pub currency: String,
    /// Contract month for futures (e.g. "202609"); `None` otherwise.
    pub contract_month: Option<String>,
}

impl Instrument {
    pub fn stock(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            security_type: SecurityType::Stk,
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            contract_month: None,
        }
    }

    pub fn future(symbol: &str, exchange: &str, contract_month: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            security_type: SecurityType::Fut,
            exchange: exchange.to_string(),
            currency: "USD".to_string(),
            contract_month: Some(contract_month.to_string()),
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.symbol, self.security_type)
    }
}

/// Option right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// An option contract as returned by the venue's chain query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Venue-assigned contract identifier.
    pub contract_id: i64,
    pub symbol: String,
    pub expiry: NaiveDate,
    pub strike: Decimal,
    pub right: OptionRight,
    /// Contract multiplier (100 for standard US equity options).
    pub multiplier: Decimal,
}

impl OptionContract {
    /// Human-readable contract description (e.g. "SPY 2026-03-20 605C").
    pub fn display_name(&self) -> String {
        format!("{} {} {}{}", self.symbol, self.expiry, self.strike, self.right)
    }
}

/// A cached option contract together with its last known quote fields.
///
/// Quote fields are `None` until the first refresh succeeds; a failed refresh
/// leaves previous values in place (stale but available).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedContract {
    pub contract: OptionContract,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub last: Option<Decimal>,
    pub volume: u64,
}

impl QuotedContract {
    pub fn unquoted(contract: OptionContract) -> Self {
        Self {
            contract,
            bid: None,
            ask: None,
            last: None,
            volume: 0,
        }
    }
}
