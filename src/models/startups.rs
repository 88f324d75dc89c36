use serde::{Deserialize, Serialize};

use crate::connector::Connector;
use crate::context::Ctx;
use crate::error::ConnectorError;
use crate::params;
use crate::scan::{DecodeMode, scan_one};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateStartupInput {
    pub name: String,
    pub logo: String,
    pub mission: String,
    pub token_name: String,
    pub token_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Startup {
    pub id: i64,
    pub name: String,
    pub logo: String,
    pub mission: String,
    pub token_name: String,
    pub token_symbol: String,
}

const COLUMNS: &str = "id, name, logo, mission, token_name, token_symbol";

#[derive(Debug, Clone)]
pub struct Startups {
    connector: Connector,
}

impl Startups {
    #[must_use]
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }

    /// # Errors
    /// Any store error.
    pub async fn create(
        &self,
        ctx: &mut Ctx<'_>,
        input: &CreateStartupInput,
    ) -> Result<Startup, ConnectorError> {
        let insert = self.connector.render(
            &format!(
                "INSERT INTO startups(name, logo, mission, token_name, token_symbol)
                 VALUES (${{name}}, ${{logo}}, ${{mission}}, ${{tokenName}}, ${{tokenSymbol}})
                 RETURNING {COLUMNS}"
            ),
            &params! {
                "name" => input.name.as_str(),
                "logo" => input.logo.as_str(),
                "mission" => input.mission.as_str(),
                "tokenName" => input.token_name.as_str(),
                "tokenSymbol" => input.token_symbol.as_str(),
            },
        )?;
        self.connector
            .invoke(ctx, async |mut ctx| {
                let rs = ctx.query(&insert).await?;
                scan_one(&rs, DecodeMode::Columns)
            })
            .await
    }

    /// # Errors
    /// [`ConnectorError::NoRows`] for an unknown id.
    pub async fn get(&self, ctx: &mut Ctx<'_>, id: i64) -> Result<Startup, ConnectorError> {
        let select = self.connector.render(
            &format!("SELECT {COLUMNS} FROM startups WHERE id = ${{id}}"),
            &params! { "id" => id },
        )?;
        self.connector
            .read(ctx, async |mut ctx| {
                let rs = ctx.query(&select).await?;
                scan_one(&rs, DecodeMode::Columns)
            })
            .await
    }

    /// Record that `user_id` follows the startup. Following twice is a no-op.
    ///
    /// Returns whether a new follow was recorded.
    ///
    /// # Errors
    /// Any store error; an unknown startup is a foreign key violation.
    pub async fn follow(
        &self,
        ctx: &mut Ctx<'_>,
        startup_id: i64,
        user_id: i64,
    ) -> Result<bool, ConnectorError> {
        let insert = self.connector.render(
            "INSERT INTO startups_follows_rel(startup_id, user_id)
             VALUES (${startupId}, ${userId})
             ON CONFLICT (startup_id, user_id) DO NOTHING",
            &params! { "startupId" => startup_id, "userId" => user_id },
        )?;
        self.connector
            .invoke(ctx, async |mut ctx| Ok(ctx.execute(&insert).await? == 1))
            .await
    }
}
