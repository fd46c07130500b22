use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// The evaluation budget of a target prime field.
///
/// `bandwidth` is the number of bits a polynomial evaluation may occupy
/// without risking overflow in the field; `register_width` is the maximum
/// width of any single register in a rewritten schema. The headroom
/// between the two is what carries and non-linear terms spend.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub bandwidth: usize,
    pub register_width: usize,
}

impl FieldConfig {
    pub fn new(
        name: impl Into<String>,
        bandwidth: usize,
        register_width: usize,
    ) -> Result<Self> {
        let config = Self {
            name: name.into(),
            bandwidth,
            register_width,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.bandwidth >= 8,
            "field `{}`: bandwidth {} below the supported minimum of 8",
            self.name,
            self.bandwidth,
        );
        ensure!(
            self.register_width > 0 && self.register_width < self.bandwidth,
            "field `{}`: register width {} must satisfy 0 < W < {}",
            self.name,
            self.register_width,
            self.bandwidth,
        );
        Ok(())
    }

    /// The Goldilocks field, `p = 2^64 - 2^32 + 1`.
    pub fn goldilocks() -> Self {
        Self {
            name: "goldilocks".into(),
            bandwidth: 63,
            register_width: 32,
        }
    }

    /// The scalar field of BN254.
    pub fn bn254() -> Self {
        Self {
            name: "bn254".into(),
            bandwidth: 253,
            register_width: 160,
        }
    }

    /// The scalar field of BLS12-377.
    pub fn bls12_377() -> Self {
        Self {
            name: "bls12-377".into(),
            bandwidth: 252,
            register_width: 160,
        }
    }

    /// A deliberately narrow config over a small testing prime, useful for
    /// forcing splits with tiny registers.
    pub fn tiny() -> Self {
        Self {
            name: "f65537".into(),
            bandwidth: 16,
            register_width: 8,
        }
    }
}
