//! Drift decision table for a single (subject, kind) pair.
//!
//! | external role | local record | action                     |
//! |---------------|--------------|----------------------------|
//! | present       | absent       | `Backfill`                 |
//! | present       | expired      | `Cleanup`                  |
//! | present       | active       | `None`                     |
//! | absent        | active       | `Restore` / `DropLocal`    |
//! | absent        | expired      | `None` (left to the sweep) |
//! | absent        | absent       | `None`                     |

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Cooldown;
use crate::domain::foundation::Timestamp;

/// Which side wins when external and local state disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Local records are authoritative; external drift is repaired.
    Enforce,
    /// External roles are authoritative; local records are rewritten.
    Accept,
}

impl EnforcementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementMode::Enforce => "enforce",
            EnforcementMode::Accept => "accept",
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repair required to bring a (subject, kind) pair back into agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownAction {
    None,
    /// Role present without a record: create one with the default duration.
    Backfill,
    /// Role present with an expired record: remove role, delete record.
    Cleanup,
    /// Role absent with an active record (enforce): re-add the role.
    Restore,
    /// Role absent with an active record (accept): delete the record.
    DropLocal,
}

impl CooldownAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CooldownAction::None => "none",
            CooldownAction::Backfill => "backfill",
            CooldownAction::Cleanup => "cleanup",
            CooldownAction::Restore => "restore",
            CooldownAction::DropLocal => "drop_local",
        }
    }

    pub fn mutates_role(&self) -> bool {
        matches!(self, CooldownAction::Cleanup | CooldownAction::Restore)
    }
}

impl fmt::Display for CooldownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn decide_cooldown_action(
    role_present: bool,
    record: Option<&Cooldown>,
    now: Timestamp,
    mode: EnforcementMode,
) -> CooldownAction {
    match (role_present, record) {
        (true, None) => CooldownAction::Backfill,
        (true, Some(cd)) if cd.is_expired(now) => CooldownAction::Cleanup,
        (true, Some(_)) => CooldownAction::None,
        (false, Some(cd)) if !cd.is_expired(now) => match mode {
            EnforcementMode::Enforce => CooldownAction::Restore,
            EnforcementMode::Accept => CooldownAction::DropLocal,
        },
        (false, _) => CooldownAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cooldown::CooldownKind;
    use crate::domain::foundation::SubjectId;
    use proptest::prelude::*;
    use std::time::Duration;

    fn record(now: Timestamp, offset_minutes: i64) -> Cooldown {
        let mut cd = Cooldown::new(
            SubjectId::new("7").unwrap(),
            CooldownKind::new("org_leave").unwrap(),
            Duration::from_secs(0),
            None,
            now,
        );
        cd.expires_at = now.plus_minutes(offset_minutes);
        cd
    }

    #[test]
    fn present_without_record_backfills() {
        let now = Timestamp::now();
        for mode in [EnforcementMode::Enforce, EnforcementMode::Accept] {
            assert_eq!(
                decide_cooldown_action(true, None, now, mode),
                CooldownAction::Backfill
            );
        }
    }

    #[test]
    fn present_with_expired_record_cleans_up() {
        let now = Timestamp::now();
        let cd = record(now, -1);
        assert_eq!(
            decide_cooldown_action(true, Some(&cd), now, EnforcementMode::Enforce),
            CooldownAction::Cleanup
        );
    }

    #[test]
    fn absent_with_active_record_depends_on_mode() {
        let now = Timestamp::now();
        let cd = record(now, 30);
        assert_eq!(
            decide_cooldown_action(false, Some(&cd), now, EnforcementMode::Enforce),
            CooldownAction::Restore
        );
        assert_eq!(
            decide_cooldown_action(false, Some(&cd), now, EnforcementMode::Accept),
            CooldownAction::DropLocal
        );
    }

    #[test]
    fn agreeing_states_need_nothing() {
        let now = Timestamp::now();
        let active = record(now, 30);
        let expired = record(now, -30);
        let mode = EnforcementMode::Enforce;

        assert_eq!(decide_cooldown_action(true, Some(&active), now, mode), CooldownAction::None);
        assert_eq!(decide_cooldown_action(false, None, now, mode), CooldownAction::None);
        assert_eq!(decide_cooldown_action(false, Some(&expired), now, mode), CooldownAction::None);
    }

    proptest! {
        #[test]
        fn enforce_never_drops_and_accept_never_restores(
            present in any::<bool>(),
            has_record in any::<bool>(),
            offset in -600i64..600,
        ) {
            let now = Timestamp::now();
            let cd = record(now, offset);
            let rec = if has_record { Some(&cd) } else { None };

            let enforce = decide_cooldown_action(present, rec, now, EnforcementMode::Enforce);
            let accept = decide_cooldown_action(present, rec, now, EnforcementMode::Accept);

            prop_assert_ne!(enforce, CooldownAction::DropLocal);
            prop_assert_ne!(accept, CooldownAction::Restore);
            // The modes only disagree on the absent-role/active-record row.
            if enforce != accept {
                prop_assert!(!present && has_record && offset > 0);
            }
        }
    }
}
