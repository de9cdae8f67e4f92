use chrono::{DateTime, TimeDelta, Utc};

use crate::error::AppError;

/// Minimum interval between two changes of the same profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    pub field: &'static str,
    pub window: TimeDelta,
}

pub const PASSWORD_COOLDOWN: Cooldown = Cooldown {
    field: "password",
    window: TimeDelta::minutes(30),
};

pub const USERNAME_COOLDOWN: Cooldown = Cooldown {
    field: "username",
    window: TimeDelta::hours(24),
};

pub const HEAD_IMAGE_COOLDOWN: Cooldown = Cooldown {
    field: "head image",
    window: TimeDelta::hours(24),
};

impl Cooldown {
    /// Fail with [`AppError::TooSoon`] unless the window since `last_change` has elapsed.
    /// A field that was never changed is always allowed.
    pub fn check(&self, last_change: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<(), AppError> {
        let Some(last) = last_change else {
            return Ok(());
        };

        let elapsed = now - last;
        if elapsed > self.window {
            return Ok(());
        }

        let remaining = self.window - elapsed;
        Err(AppError::TooSoon {
            field: self.field,
            retry_after_secs: remaining.num_seconds().max(1),
        })
    }
}
