use async_trait::async_trait;
use rocketlink_core::{
    AgentRoute, AgentRuntime, InboundContext, ReplyPayload, ReplySink, RouteRequest,
};

/// Replies with the inbound text. Useful to check connectivity end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoAgent;

#[async_trait]
impl AgentRuntime for EchoAgent {
    fn resolve_agent_route(&self, request: &RouteRequest) -> anyhow::Result<AgentRoute> {
        Ok(AgentRoute {
            session_key: format!("echo:{}:{}", request.account_id, request.peer.id),
        })
    }

    async fn dispatch_reply(
        &self,
        ctx: InboundContext,
        sink: &dyn ReplySink,
    ) -> anyhow::Result<()> {
        let sender = if ctx.sender_name.is_empty() {
            &ctx.sender_username
        } else {
            &ctx.sender_name
        };
        let mut text = format!("[echo] {}: {}", sender, ctx.body);
        if !ctx.media_paths.is_empty() {
            text.push_str(&format!(" ({} attachment(s))", ctx.media_paths.len()));
        }
        sink.deliver(ReplyPayload::text(text)).await
    }
}
