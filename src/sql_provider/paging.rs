//! Row-number window used when paging is rewritten into `ROW_NUMBER() OVER (…)`.

use crate::error::{QueryError, QueryResult};

/// Inclusive 1-based row-number range selected by skip/take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowNumberWindow {
    pub first: i64,
    pub last: Option<i64>,
}

impl RowNumberWindow {
    pub fn from_paging(skip: i64, take: Option<i64>) -> QueryResult<Self> {
        let overflow = || QueryError::render(format!("paging window skip {} take {:?} overflows", skip, take));
        let first = skip.checked_add(1).ok_or_else(overflow)?;
        let last = match take {
            Some(take) => Some(skip.checked_add(take).ok_or_else(overflow)?),
            None => None,
        };
        Ok(Self { first, last })
    }

    pub fn contains(&self, row_number: i64) -> bool {
        row_number >= self.first && self.last.is_none_or(|last| row_number <= last)
    }

    /// Condition on `column`: `= n`, `BETWEEN a AND b` or `> skip`.
    pub fn condition(&self, column: &str) -> String {
        match self.last {
            Some(last) if last == self.first => format!("{} = {}", column, self.first),
            Some(last) => format!("{} BETWEEN {} AND {}", column, self.first, last),
            None => format!("{} > {}", column, self.first - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions() {
        let window = |skip, take| RowNumberWindow::from_paging(skip, take).unwrap();
        assert_eq!(window(5, Some(10)).condition("t.rn"), "t.rn BETWEEN 6 AND 15");
        assert_eq!(window(5, Some(1)).condition("t.rn"), "t.rn = 6");
        assert_eq!(window(5, None).condition("t.rn"), "t.rn > 5");
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(RowNumberWindow::from_paging(i64::MAX, None).is_err());
        assert!(RowNumberWindow::from_paging(i64::MAX - 1, Some(2)).is_err());
        assert!(RowNumberWindow::from_paging(i64::MAX - 1, None).is_ok());
    }
}
