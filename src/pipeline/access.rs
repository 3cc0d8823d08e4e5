//! Permission enforcement.

use super::options::AccessCheckMode;
use crate::error::{Error, Result};
use crate::model::Permissions;

/// Fail with `AccessDenied` when `mode` forbids extracting this document.
pub fn check_access(mode: AccessCheckMode, permissions: &Permissions) -> Result<()> {
    if mode == AccessCheckMode::DontCheck || permissions.can_extract_content {
        return Ok(());
    }
    match mode {
        AccessCheckMode::AllowForAccessibility if permissions.can_extract_for_accessibility => {
            Ok(())
        }
        AccessCheckMode::AllowForAccessibility => Err(Error::AccessDenied(
            "content extraction for accessibility is not allowed".into(),
        )),
        _ => Err(Error::AccessDenied("content extraction is not allowed".into())),
    }
}
