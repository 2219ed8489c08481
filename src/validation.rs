//! Submission validation. Fails fast, before any key derivation or write;
//! the HTTP layer translates the failures into user-facing 422s.

use chrono::NaiveDate;

use crate::config::{MAX_ATTACHMENTS, MAX_REFINE};
use crate::error::{AppError, Result};

pub fn validate_submission(
    price_zeny: i64,
    refine: u32,
    attachment_ids: &[i64],
    date: NaiveDate,
    today: NaiveDate,
) -> Result<()> {
    if price_zeny <= 0 {
        return Err(AppError::Validation(
            "price must be greater than zero".to_string(),
        ));
    }
    if refine > MAX_REFINE {
        return Err(AppError::Validation(format!(
            "refine level {refine} exceeds the cap of {MAX_REFINE}"
        )));
    }
    if attachment_ids.len() > MAX_ATTACHMENTS {
        return Err(AppError::Validation(format!(
            "at most {MAX_ATTACHMENTS} attachments are allowed, got {}",
            attachment_ids.len()
        )));
    }
    if date > today {
        return Err(AppError::Validation(
            "cannot record a price for a future date".to_string(),
        ));
    }
    Ok(())
}
