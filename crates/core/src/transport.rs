//! Transport selection: exactly one delivery path per rendered message.
//!
//! Order of preference: modal (requires a trigger id), direct response-URL
//! POST for private commands, then channel delivery - resolving a group
//! conversation for multi-party sessions and falling back to a DM with the
//! inviter. Every non-modal, non-response-URL message is stamped with the
//! session key as its callback reference so subsequent interactive
//! callbacks route back to the same session.

use crate::errors::TransportError;
use crate::handler::SlashContext;
use crate::platform::PlatformClient;
use crate::trigger::ConversationAs;
use crate::views::{Message, View};

pub async fn deliver(
    client: &dyn PlatformClient,
    view: &View,
    ctx: &mut SlashContext,
    mut message: Message,
) -> Result<(), TransportError> {
    let session_key = ctx.session_key();

    if view.modal {
        let trigger_id =
            ctx.trigger_id.clone().ok_or(TransportError::MissingTriggerId)?;
        message.callback_id = Some(session_key);
        if let Some(body) = message.modal.as_mut().and_then(|body| body.as_object_mut()) {
            body.insert("callback_id".to_owned(), message.callback_id.clone().into());
        }
        client.open_modal(&trigger_id, &message).await?;
        return Ok(());
    }

    for attachment in &mut message.attachments {
        attachment.callback_id = Some(session_key.clone());
    }

    if ctx.private {
        if let Some(url) = ctx.response_url.clone() {
            tracing::debug!(session_id = %session_key, "replying via response url");
            client.post_response_url(&url, &message).await?;
            return Ok(());
        }
    }

    let as_bot = ctx.trigger.conversation_as == ConversationAs::Bot;
    if ctx.is_multi_conversation() {
        if as_bot && !client.has_bot_credential() {
            return Err(TransportError::MissingBotCredential);
        }
        if ctx.channel.is_none() {
            let mut users = Vec::with_capacity(ctx.trigger.conversation_with.len() + 1);
            users.push(ctx.trigger.user.clone());
            users.extend(ctx.trigger.conversation_with.iter().cloned());
            let channel = client.open_mpim(&users, as_bot).await?;
            tracing::debug!(session_id = %session_key, channel, "opened group conversation");
            ctx.channel = Some(channel);
        }
    }

    let channel = match ctx.channel.clone() {
        Some(channel) => channel,
        None => {
            let channel = client.open_im(&ctx.trigger.user).await?;
            ctx.channel = Some(channel.clone());
            channel
        }
    };

    if ctx.is_multi_conversation() && ctx.private {
        client.post_ephemeral(&channel, &ctx.trigger.user, &message, as_bot).await?;
    } else {
        client.post_message(&channel, &message, as_bot).await?;
    }
    Ok(())
}
