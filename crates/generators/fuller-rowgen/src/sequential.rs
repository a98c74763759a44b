use crate::{ConfigError, RowGeneratorConfig};
use fuller_core::rowgen::{RowGeneration, RowMapping};

/// Hammers a fixed base row against a sequentially advancing partner.
///
/// Iteration `n` yields the pair `(start_row, start_row + n % nr_rows)`, so
/// a full sweep pairs the base row with every row of the configured range.
#[derive(Debug, Clone)]
pub struct SequentialPairs {
    start_row: usize,
    nr_rows: usize,
    mapping: RowMapping,
}

impl SequentialPairs {
    /// Creates the strategy from `config` (`start_row`, `nr_rows`,
    /// `max_row`, `mapping`).
    pub fn new(config: &RowGeneratorConfig) -> Result<Self, ConfigError> {
        if config.nr_rows == 0 {
            return Err(ConfigError::NotPositive {
                strategy: "sequential_pairs",
                parameter: "nr_rows",
            });
        }
        if config.start_row + config.nr_rows > config.max_row {
            return Err(ConfigError::RangeTooWide {
                strategy: "sequential_pairs",
                start_row: config.start_row,
                nr_rows: config.nr_rows,
                max_row: config.max_row,
            });
        }
        Ok(SequentialPairs {
            start_row: config.start_row,
            nr_rows: config.nr_rows,
            mapping: config.mapping,
        })
    }
}

impl RowGeneration for SequentialPairs {
    fn generate_rows(&mut self, iteration: usize) -> Vec<usize> {
        let partner = self.start_row + iteration % self.nr_rows;
        vec![
            self.mapping.logical_to_physical(self.start_row),
            self.mapping.logical_to_physical(partner),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(start_row: usize, nr_rows: usize) -> RowGeneratorConfig {
        RowGeneratorConfig {
            nr_rows,
            max_row: 64,
            start_row,
            seed: None,
            mapping: RowMapping::Trivial,
        }
    }

    #[test]
    fn pairs_the_base_row_with_the_sweep() {
        let mut pairs = SequentialPairs::new(&config(10, 4)).unwrap();
        assert_eq!(pairs.generate_rows(0), [10, 10]);
        assert_eq!(pairs.generate_rows(3), [10, 13]);
        assert_eq!(pairs.generate_rows(4), [10, 10]);
    }

    #[test]
    fn range_must_fit_below_max_row() {
        assert_eq!(
            SequentialPairs::new(&config(60, 8)).unwrap_err(),
            ConfigError::RangeTooWide {
                strategy: "sequential_pairs",
                start_row: 60,
                nr_rows: 8,
                max_row: 64,
            }
        );
    }
}
