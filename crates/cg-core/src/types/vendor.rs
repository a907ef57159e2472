//! Vendor structs shared by the quote and trade sides.
//!
//! Field names follow the vendor SDK so a binding layer can fill them
//! without renaming; both derive `Deserialize` so recorded callbacks can be
//! replayed from JSON.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, vendor_message};

/// Synchronous outcome of a vendor request call; `Err` carries the
/// non-zero return code.
pub type ReqResult = Result<(), i32>;

/// Result code attached to every vendor response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspCode {
    #[serde(default)]
    pub ret_code: i32,
    #[serde(default)]
    pub ret_msg: String,
}

impl RspCode {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(ret_code: i32, ret_msg: impl Into<String>) -> Self {
        Self { ret_code, ret_msg: ret_msg.into() }
    }

    pub fn is_ok(&self) -> bool {
        self.ret_code == 0
    }

    /// Convert into a `Result`, preferring the vendor's own message and
    /// falling back to the fixed code table when it is empty.
    pub fn into_result(self) -> Result<(), GatewayError> {
        if self.is_ok() {
            return Ok(());
        }
        let message = if self.ret_msg.is_empty() {
            vendor_message(self.ret_code).to_string()
        } else {
            self.ret_msg
        };
        Err(GatewayError::Vendor { code: self.ret_code, message })
    }
}

/// Login answer delivered by both the trade and quote services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAns {
    #[serde(default)]
    pub ret_code: i32,
    #[serde(default)]
    pub ret_msg: String,
    /// Terminal id assigned to this session (trade side only).
    #[serde(default)]
    pub id: u32,
}

/// Front-gateway credentials used by both logins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FgsUser {
    pub login_code: String,
    pub password: String,
}
