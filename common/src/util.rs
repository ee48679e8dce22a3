use std::{fs::create_dir_all, path::Path};

use eyre::{Context, Result};

use crate::error::EvalError;

/// Splits a delimited CLI list, trimming every item
pub fn split_list(list: &str, delimiter: char) -> Vec<String> {
    list.split(delimiter).map(|x| x.trim().to_owned()).collect()
}

pub fn check_len(what: &str, expected: usize, got: usize) -> Result<(), EvalError> {
    if expected != got {
        return Err(EvalError::ArgumentMismatch {
            what: what.to_owned(),
            expected,
            got,
        });
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        create_dir_all(parent).context(format!("Create {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists() {
        assert_eq!(split_list("a.csv, b.csv ,c.csv", ','), vec!["a.csv", "b.csv", "c.csv"]);
        assert_eq!(split_list("x|y", '|'), vec!["x", "y"]);
    }

    #[test]
    fn lengths() {
        assert!(check_len("labels", 2, 2).is_ok());
        assert_eq!(
            check_len("labels", 2, 3),
            Err(EvalError::ArgumentMismatch {
                what: "labels".to_owned(),
                expected: 2,
                got: 3
            })
        );
    }
}
