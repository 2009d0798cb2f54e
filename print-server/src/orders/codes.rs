//! 取件码签发与核销
//!
//! - 6 位数字，000000 - 999999，前导零保留
//! - 同一时刻一个码只对应一条 ACTIVE 记录，一个订单最多一个 ACTIVE 码
//! - 过期由时间决定：`now >= expires_at` 即不可核销，不依赖扫描任务是否已运行
//!
//! 所有写操作都在调用方的 `WriteTransaction` 内完成，与订单状态变更一起提交。

use rand::Rng;
use redb::WriteTransaction;
use serde::Serialize;
use shared::order::code::{CODE_LENGTH, normalize_code};
use shared::order::{CodeStatus, CodeType, VerificationCode};
use std::sync::Arc;
use std::time::Duration;

use super::error::{OrderError, OrderResult};
use super::storage::OrderStorage;

/// Collision retries before giving up
pub const MAX_GENERATE_ATTEMPTS: u32 = 32;

const CODE_SPACE: u32 = 1_000_000;

/// Source of candidate codes
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform random 6-digit codes
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let n = rand::thread_rng().gen_range(0..CODE_SPACE);
        format!("{:0width$}", n, width = CODE_LENGTH)
    }
}

/// Result of a read-only code check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCheck {
    pub code: String,
    pub order_id: String,
    pub code_type: CodeType,
    pub expires_at: i64,
    pub remaining_minutes: i64,
}

/// Reject anything that is not currently redeemable
fn ensure_redeemable(record: &VerificationCode, now: i64) -> OrderResult<()> {
    match record.status {
        CodeStatus::Used => Err(OrderError::CodeAlreadyUsed(record.code.clone())),
        CodeStatus::Expired => Err(OrderError::CodeExpired(record.code.clone())),
        CodeStatus::Active if record.is_past_expiry(now) => {
            Err(OrderError::CodeExpired(record.code.clone()))
        }
        CodeStatus::Active => Ok(()),
    }
}

/// Verification code issuer
#[derive(Clone)]
pub struct CodeIssuer {
    storage: OrderStorage,
    generator: Arc<dyn CodeGenerator>,
}

impl CodeIssuer {
    pub fn new(storage: OrderStorage) -> Self {
        Self::with_generator(storage, Arc::new(RandomCodeGenerator))
    }

    pub fn with_generator(storage: OrderStorage, generator: Arc<dyn CodeGenerator>) -> Self {
        Self { storage, generator }
    }

    /// Issue a new ACTIVE code for an order
    ///
    /// Any code the order still holds is expired first, so the order ends up
    /// with exactly one ACTIVE code.
    pub fn issue_in(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        code_type: CodeType,
        ttl: Duration,
        now: i64,
    ) -> OrderResult<VerificationCode> {
        if let Some(previous) = self.revoke_for_order_in(txn, order_id, now)? {
            tracing::debug!(order_id = %order_id, code = %previous.code, "Previous code superseded");
        }

        for attempt in 1..=MAX_GENERATE_ATTEMPTS {
            let code = self.generator.generate();
            if self.storage.is_code_active_txn(txn, &code)?
                || self.storage.code_record_exists_txn(txn, &code, now)?
            {
                tracing::debug!(attempt, "Verification code collision, retrying");
                continue;
            }

            let record = VerificationCode {
                code,
                order_id: order_id.to_string(),
                code_type,
                status: CodeStatus::Active,
                issued_at: now,
                expires_at: now.saturating_add(ttl.as_millis() as i64),
                used_at: None,
                used_by: None,
                expired_at: None,
            };
            self.storage.insert_active_code(txn, &record)?;
            return Ok(record);
        }

        tracing::error!(
            order_id = %order_id,
            attempts = MAX_GENERATE_ATTEMPTS,
            "Verification code space exhausted"
        );
        Err(OrderError::CodeSpaceExhausted(MAX_GENERATE_ATTEMPTS))
    }

    /// Mark a code USED
    ///
    /// The caller commits only if the order transition also succeeds, so a
    /// failed transition never burns the code.
    pub fn consume_in(
        &self,
        txn: &WriteTransaction,
        code: &str,
        used_by: &str,
        now: i64,
    ) -> OrderResult<VerificationCode> {
        let mut record = self.lookup_in(txn, code)?;
        ensure_redeemable(&record, now)?;

        record.status = CodeStatus::Used;
        record.used_at = Some(now);
        record.used_by = Some(used_by.to_string());
        self.storage.update_code(txn, &record)?;
        Ok(record)
    }

    /// Expire a code if it is still ACTIVE and past its expiry
    ///
    /// Returns `None` when there is nothing to do (already redeemed, already
    /// expired, or not yet due).
    pub fn expire_in(
        &self,
        txn: &WriteTransaction,
        code: &str,
        now: i64,
    ) -> OrderResult<Option<VerificationCode>> {
        match self.storage.get_active_code_txn(txn, code)? {
            Some(mut record) if record.is_past_expiry(now) => {
                record.status = CodeStatus::Expired;
                record.expired_at = Some(now);
                self.storage.update_code(txn, &record)?;
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    /// Expire the order's ACTIVE code regardless of its expiry time
    pub fn revoke_for_order_in(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        now: i64,
    ) -> OrderResult<Option<VerificationCode>> {
        match self.storage.get_order_active_code_txn(txn, order_id)? {
            Some(mut record) => {
                record.status = CodeStatus::Expired;
                record.expired_at = Some(now);
                self.storage.update_code(txn, &record)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Read-only check whether a code could be redeemed right now
    pub fn validate(&self, code: &str, now: i64) -> OrderResult<CodeCheck> {
        let normalized =
            normalize_code(code).ok_or_else(|| OrderError::CodeNotFound(code.to_string()))?;
        let record = match self.storage.get_active_code(&normalized)? {
            Some(record) => record,
            None => self
                .storage
                .get_latest_code(&normalized)?
                .ok_or(OrderError::CodeNotFound(normalized))?,
        };
        ensure_redeemable(&record, now)?;

        Ok(CodeCheck {
            remaining_minutes: record.remaining_minutes(now),
            code: record.code,
            order_id: record.order_id,
            code_type: record.code_type,
            expires_at: record.expires_at,
        })
    }

    /// ACTIVE record if any, otherwise the latest historical one
    fn lookup_in(&self, txn: &WriteTransaction, code: &str) -> OrderResult<VerificationCode> {
        if let Some(record) = self.storage.get_active_code_txn(txn, code)? {
            return Ok(record);
        }
        self.storage
            .get_latest_code_txn(txn, code)?
            .ok_or_else(|| OrderError::CodeNotFound(code.to_string()))
    }
}
