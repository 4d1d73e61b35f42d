//! Supported `invoke_*` signatures.
//!
//! A trampoline name spells its signature: `invoke_` followed by one code
//! for the return (`v` for none) and one code per parameter, so
//! `invoke_iii` takes two `i32` arguments and returns an `i32`. Adding a
//! variant is a matter of adding its name to [`INVOKE_NAMES`].

use emrun::{FuncType, ValType};

use crate::codec::ValueKind;

/// Prefix shared by every trampoline name.
pub const INVOKE_PREFIX: &str = "invoke_";

/// Highest parameter count a trampoline accepts, excluding the table index.
pub const MAX_PARAMS: usize = 4;

/// Trampolines registered by [`instantiate`](crate::instantiate).
pub const INVOKE_NAMES: [&str; 10] = [
    "invoke_i",
    "invoke_ii",
    "invoke_iii",
    "invoke_iiii",
    "invoke_iiiii",
    "invoke_v",
    "invoke_vi",
    "invoke_vii",
    "invoke_viii",
    "invoke_viiii",
];

/// Error parsing a trampoline name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} does not start with {}", INVOKE_PREFIX)]
    MissingPrefix(String),
    #[error("{0} has no return code")]
    MissingReturn(String),
    #[error("{name} uses unknown value code {code:?}")]
    UnknownCode { name: String, code: char },
    #[error("{name} takes {count} parameters, at most {} are supported", MAX_PARAMS)]
    TooManyParams { name: String, count: usize },
}

/// Signature of one trampoline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    result: Option<ValueKind>,
    params: Vec<ValueKind>,
}

impl Signature {
    /// Parse a trampoline name such as `invoke_viii`.
    pub fn parse(name: &str) -> Result<Self, CatalogError> {
        let code = name
            .strip_prefix(INVOKE_PREFIX)
            .ok_or_else(|| CatalogError::MissingPrefix(name.to_string()))?;
        let mut codes = code.chars();
        let result = match codes.next() {
            None => return Err(CatalogError::MissingReturn(name.to_string())),
            Some('v') => None,
            Some(c) => Some(kind(name, c)?),
        };
        let params = codes.map(|c| kind(name, c)).collect::<Result<Vec<_>, _>>()?;
        if params.len() > MAX_PARAMS {
            return Err(CatalogError::TooManyParams {
                name: name.to_string(),
                count: params.len(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            result,
            params,
        })
    }

    /// Import name, such as `invoke_vii`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the trampoline returns a value.
    pub fn has_return(&self) -> bool {
        self.result.is_some()
    }

    /// Kind of the returned value, if any.
    pub fn result(&self) -> Option<ValueKind> {
        self.result
    }

    /// Kinds of the forwarded arguments, excluding the table index.
    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    /// Number of forwarded arguments.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Type the guest imports the trampoline with: the `i32` table index
    /// followed by the forwarded arguments.
    pub fn import_type(&self) -> FuncType {
        let params = std::iter::once(ValType::I32).chain(self.params.iter().map(|k| k.val_type()));
        FuncType::new(params, self.result.map(ValueKind::val_type))
    }

    /// Type the table entry must have.
    pub fn callee_type(&self) -> FuncType {
        FuncType::new(
            self.params.iter().map(|k| k.val_type()),
            self.result.map(ValueKind::val_type),
        )
    }

    /// `index`, `a1`, `a2`, ...
    pub fn param_names(&self) -> Vec<String> {
        std::iter::once("index".to_string())
            .chain((1..=self.params.len()).map(|i| format!("a{i}")))
            .collect()
    }
}

fn kind(name: &str, code: char) -> Result<ValueKind, CatalogError> {
    ValueKind::from_code(code).ok_or_else(|| CatalogError::UnknownCode {
        name: name.to_string(),
        code,
    })
}

/// Every supported trampoline signature.
pub fn catalog() -> Result<Vec<Signature>, CatalogError> {
    INVOKE_NAMES.iter().map(|name| Signature::parse(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_all_arities() {
        let catalog = catalog().unwrap();
        assert_eq!(catalog.len(), 10);
        for count in 0..=MAX_PARAMS {
            for has_return in [true, false] {
                assert!(
                    catalog
                        .iter()
                        .any(|s| s.param_count() == count && s.has_return() == has_return),
                    "missing arity {count} (return: {has_return})"
                );
            }
        }
        assert!(catalog
            .iter()
            .flat_map(|s| s.params().iter().copied().chain(s.result()))
            .all(|k| k == ValueKind::I32));
    }

    #[test]
    fn name_spells_the_signature() {
        let sig = Signature::parse("invoke_viii").unwrap();
        assert!(!sig.has_return());
        assert_eq!(sig.param_count(), 3);
        assert_eq!(sig.param_names(), vec!["index", "a1", "a2", "a3"]);
        assert_eq!(
            sig.import_type(),
            FuncType::new([ValType::I32; 4], Vec::new())
        );

        let sig = Signature::parse("invoke_i").unwrap();
        assert_eq!(sig.result(), Some(ValueKind::I32));
        assert_eq!(sig.callee_type(), FuncType::new(Vec::new(), [ValType::I32]));
    }

    #[test]
    fn wider_kinds_parse() {
        let sig = Signature::parse("invoke_dijf").unwrap();
        assert_eq!(sig.result(), Some(ValueKind::F64));
        assert_eq!(sig.params(), &[ValueKind::I32, ValueKind::I64, ValueKind::F32]);
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert_eq!(
            Signature::parse("call_i"),
            Err(CatalogError::MissingPrefix("call_i".into()))
        );
        assert_eq!(
            Signature::parse("invoke_"),
            Err(CatalogError::MissingReturn("invoke_".into()))
        );
        assert_eq!(
            Signature::parse("invoke_vx"),
            Err(CatalogError::UnknownCode {
                name: "invoke_vx".into(),
                code: 'x'
            })
        );
        assert!(matches!(
            Signature::parse("invoke_viiiii"),
            Err(CatalogError::TooManyParams { count: 5, .. })
        ));
    }
}
