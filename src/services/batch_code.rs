//! # Batch Code Generator
//!
//! Batch codes are positive integers rendered as strings. A code, once issued, is never
//! issued again: allocation takes the larger of the locked `tray_batch_sequences` counter
//! and the highest code on any tray (soft-deleted rows included), and adds one.

use crate::constants::batch::MAX_BATCH_CODE_DIGITS;
use crate::error::{Result, SproutError};
use crate::store::{TrayStore, TrayTransaction};
use std::cmp::Ordering;

/// Largest value a well-formed batch code can hold
pub const MAX_BATCH_CODE: i64 = 999_999_999_999_999_999;

/// Parse a batch code as a positive integer.
///
/// Only ASCII digits are accepted, at most 18 of them. Signs, whitespace, decimal points
/// and exponents are rejected.
pub fn parse_batch_code(code: &str) -> Option<i64> {
    if code.is_empty()
        || code.len() > MAX_BATCH_CODE_DIGITS
        || !code.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    code.parse::<i64>().ok().filter(|value| *value > 0)
}

pub fn is_valid_batch_code_format(code: &str) -> bool {
    parse_batch_code(code).is_some()
}

/// Highest well-formed code in `codes`, or 0 if there is none
pub fn max_batch_code<I, S>(codes: I) -> i64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    codes
        .into_iter()
        .filter_map(|code| parse_batch_code(code.as_ref()))
        .max()
        .unwrap_or(0)
}

/// The code that follows `floor`
pub fn next_after(floor: i64) -> Result<i64> {
    match floor.checked_add(1) {
        Some(next) if next <= MAX_BATCH_CODE => Ok(next.max(1)),
        _ => Err(SproutError::InvalidState(
            "batch code space exhausted".to_string(),
        )),
    }
}

/// Order batch codes numerically when both are well formed.
///
/// Well-formed codes sort before free-form ones; free-form codes compare as strings.
pub fn compare_batch_codes(a: &str, b: &str) -> Ordering {
    match (parse_batch_code(a), parse_batch_code(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

pub struct BatchCodeGenerator;

impl BatchCodeGenerator {
    /// Report the next code without allocating it
    pub async fn preview(store: &dyn TrayStore) -> Result<String> {
        let scan_max = max_batch_code(store.all_batch_codes().await?);
        let counter = store.batch_sequence_value().await?;
        Ok(next_after(scan_max.max(counter))?.to_string())
    }

    /// Allocate the next code inside `tx`.
    ///
    /// The counter row stays locked until `tx` ends, so concurrent allocations
    /// serialize on it.
    pub async fn allocate(tx: &mut dyn TrayTransaction) -> Result<String> {
        let counter = tx.lock_batch_sequence().await?;
        let scan_max = max_batch_code(tx.batch_codes().await?);
        let next = next_after(counter.max(scan_max))?;
        tx.set_batch_sequence(next).await?;

        tracing::debug!(
            counter = counter,
            scan_max = scan_max,
            allocated = next,
            "Allocated batch code"
        );
        Ok(next.to_string())
    }
}
