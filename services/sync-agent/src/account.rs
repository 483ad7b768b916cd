//! Account Identity
//!
//! Resolves the account a credential scans, used as the first segment of
//! every directory key.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Credential;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("malformed role ARN: {0}")]
    MalformedArn(String),

    #[error("account lookup failed: {0}")]
    Lookup(String),
}

#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn account_id(&self, credential: &Credential) -> Result<String, AccountError>;
}

/// Reads the account field out of the role ARN
/// (`arn:<partition>:iam::<account>:role/<name>`)
#[derive(Debug, Clone, Copy, Default)]
pub struct ArnAccountResolver;

#[async_trait]
impl AccountResolver for ArnAccountResolver {
    async fn account_id(&self, credential: &Credential) -> Result<String, AccountError> {
        account_from_arn(&credential.role_arn)
    }
}

pub fn account_from_arn(arn: &str) -> Result<String, AccountError> {
    let malformed = || AccountError::MalformedArn(arn.to_string());

    let mut fields = arn.splitn(6, ':');
    if fields.next() != Some("arn") {
        return Err(malformed());
    }
    let _partition = fields.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
    let _service = fields.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
    let _region = fields.next().ok_or_else(malformed)?;
    let account = fields.next().filter(|a| !a.is_empty()).ok_or_else(malformed)?;
    let _resource = fields.next().filter(|r| !r.is_empty()).ok_or_else(malformed)?;

    Ok(account.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_from_role_arn() {
        assert_eq!(
            account_from_arn("arn:aws:iam::123456789012:role/gateway-reader").unwrap(),
            "123456789012"
        );
        assert_eq!(
            account_from_arn("arn:aws-cn:iam::210987654321:role/path/to/role").unwrap(),
            "210987654321"
        );
    }

    #[test]
    fn test_malformed_arns() {
        for arn in [
            "",
            "role/reader",
            "arn:aws:iam:::role/reader",
            "arn:aws:iam::123456789012",
            "urn:aws:iam::123456789012:role/reader",
        ] {
            assert!(account_from_arn(arn).is_err(), "{} should be rejected", arn);
        }
    }
}
