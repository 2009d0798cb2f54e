//! Verification (pickup) code record

use serde::{Deserialize, Serialize};

/// 取件码位数
pub const CODE_LENGTH: usize = 6;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// 验证码类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeType {
    /// 取件码
    #[default]
    Pickup,
}

/// 验证码状态
///
/// ACTIVE → USED 或 ACTIVE → EXPIRED，各自只发生一次。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeStatus {
    Active,
    Used,
    Expired,
}

/// Single-use redemption code bound to one order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCode {
    /// 6 ASCII digits
    pub code: String,
    pub order_id: String,
    pub code_type: CodeType,
    pub status: CodeStatus,
    /// Unix millis
    pub issued_at: i64,
    /// Unix millis; redeemable only while `now < expires_at`
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
}

impl VerificationCode {
    /// Expiry is derived from time, independent of whether the sweeper ran.
    pub fn is_redeemable(&self, now: i64) -> bool {
        self.status == CodeStatus::Active && now < self.expires_at
    }

    pub fn is_past_expiry(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    pub fn remaining_millis(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }

    /// 剩余有效时间（整分钟）
    pub fn remaining_minutes(&self, now: i64) -> i64 {
        self.remaining_millis(now) / MILLIS_PER_MINUTE
    }

    /// 格式化展示（如：123 456）
    pub fn formatted(&self) -> String {
        format_code(&self.code)
    }
}

/// `"123456"` → `"123 456"`; anything not 6 chars is returned unchanged.
pub fn format_code(code: &str) -> String {
    if code.len() != CODE_LENGTH || !code.is_ascii() {
        return code.to_string();
    }
    format!("{} {}", &code[..3], &code[3..])
}

/// Strips display spaces and checks for exactly 6 ASCII digits.
pub fn normalize_code(input: &str) -> Option<String> {
    let code: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    (code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())).then_some(code)
}
