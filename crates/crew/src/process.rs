//! Ordering strategies for a crew's work units

use std::fmt;
use std::str::FromStr;

use crate::{CrewError, Result};

/// Decides the order in which units run
pub trait ProcessPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// A permutation of `0..n`
    fn schedule(&self, n: usize) -> Vec<usize>;
}

/// Units run one after another in declaration order
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl ProcessPolicy for Sequential {
    fn name(&self) -> &str {
        "sequential"
    }

    fn schedule(&self, n: usize) -> Vec<usize> {
        (0..n).collect()
    }
}

/// Process names accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Process {
    #[default]
    Sequential,
}

impl Process {
    pub fn policy(self) -> Box<dyn ProcessPolicy> {
        match self {
            Self::Sequential => Box::new(Sequential),
        }
    }
}

impl FromStr for Process {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            _ => Err(CrewError::UnknownProcess(s.to_string())),
        }
    }
}

/// Check that `order` visits each of `0..n` exactly once
pub(crate) fn validate_schedule(policy: &dyn ProcessPolicy, n: usize) -> Result<Vec<usize>> {
    let order = policy.schedule(n);
    let invalid = |reason: String| CrewError::InvalidSchedule {
        policy: policy.name().to_string(),
        reason,
    };

    if order.len() != n {
        return Err(invalid(format!("expected {} units, got {}", n, order.len())));
    }
    let mut seen = vec![false; n];
    for &i in &order {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => return Err(invalid(format!("unit {} scheduled twice", i))),
            None => return Err(invalid(format!("unit {} out of range", i))),
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Broken;

    impl ProcessPolicy for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn schedule(&self, n: usize) -> Vec<usize> {
            vec![0; n]
        }
    }

    #[test]
    fn test_sequential_schedule() {
        assert_eq!(Sequential.schedule(5), vec![0, 1, 2, 3, 4]);
        assert!(Sequential.schedule(0).is_empty());
    }

    #[test]
    fn test_parse_process() {
        assert_eq!("sequential".parse::<Process>().unwrap(), Process::Sequential);
        assert_eq!(" Sequential ".parse::<Process>().unwrap(), Process::Sequential);
        assert!(matches!(
            "hierarchical".parse::<Process>(),
            Err(CrewError::UnknownProcess(p)) if p == "hierarchical"
        ));
        assert_eq!(Process::Sequential.policy().name(), "sequential");
    }

    #[test]
    fn test_validate_schedule() {
        assert_eq!(validate_schedule(&Sequential, 3).unwrap(), vec![0, 1, 2]);
        assert!(validate_schedule(&Broken, 1).is_ok());
        let err = validate_schedule(&Broken, 3).unwrap_err();
        assert!(err.to_string().contains("scheduled twice"));
    }
}
