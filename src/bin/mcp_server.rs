//! Pokémon Matchmaker MCP Server
//!
//! A Model Context Protocol server built on the official Rust SDK (rmcp) that
//! lets an LLM roll matches, place bids and advance cooldowns.
//!
//! Configuration is read from `MATCHMAKER_CONFIG_DIR` (default `config`) for
//! the event named by `MATCHMAKER_EVENT` (default `standard`).

use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard};

use pokemon_matchmaker::mcp_interface::*;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ErrorData as McpError, *},
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tokio::io::{stdin, stdout};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct MatchmakerService {
    tool_router: ToolRouter<MatchmakerService>,
    session: Arc<Mutex<MatchSession>>,
}

// Tool request structures
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BidMatchRequest {
    #[schemars(description = "Bid command, e.g. 'gen1 speed 3v3' or 'inverse pikachu,mew/onix,geodude'")]
    pub command: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ModeInfoRequest {
    #[schemars(description = "Bid alias of the mode to describe")]
    pub alias: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FinishMatchRequest {
    #[schemars(description = "Number of token matches the cooldowns advance by (default 1)")]
    pub ticks: Option<u32>,
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> McpError {
    McpError {
        code: ErrorCode(-32603),
        message: Cow::from(format!("{}: {}", context, err)),
        data: None,
    }
}

/// Rejected bids are tool errors carrying the reason as is.
fn bid_result(reply: BidReply) -> CallToolResult {
    match reply {
        BidReply::Accepted(text) => CallToolResult::success(vec![Content::text(text)]),
        BidReply::Rejected(reason) => CallToolResult::error(vec![Content::text(reason)]),
    }
}

#[tool_router]
impl MatchmakerService {
    pub fn new(session: MatchSession) -> Self {
        Self {
            tool_router: Self::tool_router(),
            session: Arc::new(Mutex::new(session)),
        }
    }

    fn session(&self) -> Result<MutexGuard<'_, MatchSession>, McpError> {
        self.session
            .lock()
            .map_err(|e| internal_error("Matchmaker session is unavailable", e))
    }

    #[tool(description = "Roll an automated match and make it the pending match")]
    async fn roll_match(&self) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        let text = roll_match(&mut session).map_err(|e| internal_error("Error making match", e))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Build a match from a bid command and make it the pending match")]
    async fn bid_match(
        &self,
        Parameters(request): Parameters<BidMatchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        let reply = bid_match(&mut session, &request.command)
            .map_err(|e| internal_error("Error making match", e))?;
        Ok(bid_result(reply))
    }

    #[tool(description = "List the biddable metagames and gimmicks with their cooldowns")]
    async fn list_biddable_modes(&self) -> Result<CallToolResult, McpError> {
        let session = self.session()?;
        let text = list_biddable_modes(session.matchmaker());
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Describe a mode by one of its bid aliases")]
    async fn mode_info(
        &self,
        Parameters(request): Parameters<ModeInfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        let session = self.session()?;
        let text = mode_info(session.matchmaker(), &request.alias);
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Get the remaining cooldown of a mode by one of its bid aliases")]
    async fn mode_cooldown(
        &self,
        Parameters(request): Parameters<ModeInfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        let session = self.session()?;
        let text = mode_cooldown(session.matchmaker(), &request.alias);
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Get the merged settings of the pending match as JSON")]
    async fn pending_settings(&self) -> Result<CallToolResult, McpError> {
        let session = self.session()?;
        let text = match session.pending() {
            Some(plan) => serde_json::to_string_pretty(&plan.settings)
                .map_err(|e| internal_error("Error encoding settings", e))?,
            None => "No match is pending. Use 'roll_match' or 'bid_match' first.".to_string(),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Mark the pending match as played and advance the cooldowns")]
    async fn finish_match(
        &self,
        Parameters(request): Parameters<FinishMatchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session()?;
        let text = finish_match(&mut session, request.ticks.unwrap_or(1));
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for MatchmakerService {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config_dir = std::env::var("MATCHMAKER_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let event_id = std::env::var("MATCHMAKER_EVENT").unwrap_or_else(|_| "standard".to_string());
    info!("Pokémon Matchmaker MCP Server starting for event `{}`", event_id);

    let session = MatchSession::load(&config_dir, &event_id, None)?;
    let service = MatchmakerService::new(session);
    let transport = (stdin(), stdout());

    let server = service.serve(transport).await?;
    info!("Server running, waiting for shutdown...");
    let quit_reason = server.waiting().await?;

    info!("Pokémon Matchmaker MCP Server exiting: {:?}", quit_reason);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_bid_is_a_tool_error() {
        let reason = "The team sizes specified in your bid do not match.";

        let rejected = serde_json::to_value(bid_result(BidReply::Rejected(reason.to_string()))).unwrap();
        let accepted =
            serde_json::to_value(bid_result(BidReply::Accepted("--- Bid Accepted ---".to_string()))).unwrap();

        assert_eq!(rejected["isError"], true);
        assert_eq!(rejected["content"][0]["text"], reason);
        assert_eq!(accepted["isError"], false);
    }
}
