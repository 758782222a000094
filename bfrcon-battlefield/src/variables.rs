//! `vars.*` and `vu.*` server variables.
//!
//! Sending a variable command with no arguments reads it; with arguments
//! it sets it.

use bfrcon_core::{Argument, Rcon};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Variables {
    rcon: Rcon,
    prefix: &'static str,
}

impl Variables {
    pub(crate) fn new(rcon: Rcon, prefix: &'static str) -> Self {
        Self { rcon, prefix }
    }

    fn command(&self, key: &str) -> String {
        format!("{}.{key}", self.prefix)
    }

    /// Current value as text.
    pub async fn get(&self, key: &str) -> Result<String> {
        let value = self
            .rcon
            .create_command(&self.command(key), Vec::<Argument>::new())
            .format(|words| words.first().map(|w| w.to_text().into_owned()).unwrap_or_default())
            .send()
            .await?;
        Ok(value)
    }

    pub async fn get_bool(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await? == "true")
    }

    /// `NaN` when the value is not numeric.
    pub async fn get_number(&self, key: &str) -> Result<f64> {
        Ok(self.get(key).await?.trim().parse().unwrap_or(f64::NAN))
    }

    pub async fn set(&self, key: &str, value: impl Into<Argument>) -> Result<()> {
        self.set_many(key, [value.into()]).await
    }

    /// For variables with several words, such as `vu.SetTeamTicketCount`.
    pub async fn set_many<I, A>(&self, key: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.rcon
            .create_command(&self.command(key), values)
            .send()
            .await?;
        Ok(())
    }
}
