/// Background task implementations
use crate::{context::AppContext, error::PlazaResult};

/// Delete refresh tokens past their expiry
pub async fn sweep_expired_tokens(ctx: &AppContext) -> PlazaResult<u64> {
    ctx.tokens.sweep_expired().await
}
