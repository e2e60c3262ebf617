use clap::Args;

use crate::error::{Result, refs as errors};
use crate::refs::{RefId, RefKind};

/// Branch used when a bare name is given without `--branch`
pub const DEFAULT_BRANCH: &str = "master";

/// Selects one ref, either spelled out or from a name plus flags
#[derive(Args, Debug, Clone)]
pub struct RefArgs {
    /// Full ref (app/NAME/ARCH/BRANCH) or an application/runtime name
    pub reference: String,

    /// Branch, when REFERENCE is a bare name
    #[arg(long)]
    pub branch: Option<String>,

    /// Architecture, when REFERENCE is a bare name
    #[arg(long)]
    pub arch: Option<String>,

    /// Treat a bare name as a runtime rather than an application
    #[arg(long)]
    pub runtime: bool,
}

impl RefArgs {
    /// Build the ref, filling the architecture from `default_arch`
    pub fn to_ref(&self, default_arch: &str) -> Result<RefId> {
        if self.reference.contains('/') {
            if self.branch.is_some() || self.arch.is_some() || self.runtime {
                return Err(errors::invalid_ref(
                    self.reference.as_str(),
                    "--branch, --arch and --runtime only apply to bare names",
                ));
            }
            return RefId::parse(&self.reference);
        }

        let kind = if self.runtime {
            RefKind::Runtime
        } else {
            RefKind::App
        };
        RefId::compose(
            kind,
            &self.reference,
            self.branch.as_deref().unwrap_or(DEFAULT_BRANCH),
            Some(self.arch.as_deref().unwrap_or(default_arch)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(reference: &str) -> RefArgs {
        RefArgs {
            reference: reference.to_string(),
            branch: None,
            arch: None,
            runtime: false,
        }
    }

    #[test]
    fn test_bare_name_uses_defaults() {
        let reference = args("org.example.Foo").to_ref("aarch64").unwrap();
        assert_eq!(reference.format(), "app/org.example.Foo/aarch64/master");
    }

    #[test]
    fn test_runtime_with_branch() {
        let target = RefArgs {
            branch: Some("23.08".to_string()),
            runtime: true,
            ..args("org.example.Platform")
        };
        let reference = target.to_ref("x86_64").unwrap();
        assert_eq!(reference.format(), "runtime/org.example.Platform/x86_64/23.08");
    }

    #[test]
    fn test_full_ref_rejects_flags() {
        let target = RefArgs {
            arch: Some("x86_64".to_string()),
            ..args("app/org.example.Foo/x86_64/stable")
        };
        assert!(target.to_ref("x86_64").is_err());
        assert!(args("app/org.example.Foo/x86_64/stable").to_ref("aarch64").is_ok());
    }
}
