use serenity::client::Context;
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::InteractionResponseType;

// Discord rejects longer button labels.
const MAX_LABEL: usize = 80;

pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

/// Acknowledges the command with an ephemeral "thinking" state.
pub async fn reply_deferred_ack(ctx: &Context, interaction: &ApplicationCommandInteraction) -> anyhow::Result<()> {
    interaction.create_interaction_response(&ctx.http, |r| {
        r.kind(InteractionResponseType::DeferredChannelMessageWithSource)
            .interaction_response_data(|d| d.ephemeral(true))
    }).await?;

    Ok(())
}

pub async fn reply_deferred_result<D: ToString>(ctx: &Context, interaction: &ApplicationCommandInteraction, content: D) -> anyhow::Result<()> {
    interaction.edit_original_interaction_response(&ctx.http, |r| r.content(content)).await?;

    Ok(())
}

/// Like `reply_deferred_result`, with one action row per five buttons.
pub async fn reply_deferred_buttons<D: ToString>(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    content: D,
    buttons: &[Button],
) -> anyhow::Result<()> {
    interaction.edit_original_interaction_response(&ctx.http, |r| {
        r.content(content).components(|c| {
            for row in buttons.chunks(5) {
                c.create_action_row(|a| {
                    for button in row {
                        a.create_button(|b| b
                            .custom_id(&button.custom_id)
                            .label(button.label.chars().take(MAX_LABEL).collect::<String>())
                            .style(button.style));
                    }
                    a
                });
            }
            c
        })
    }).await?;

    Ok(())
}

/// Replaces the message the component was attached to and drops its buttons.
pub async fn update_component_result<D: ToString>(ctx: &Context, component: &MessageComponentInteraction, content: D) -> anyhow::Result<()> {
    component.create_interaction_response(&ctx.http, |r| {
        r.kind(InteractionResponseType::UpdateMessage)
            .interaction_response_data(|d| d.content(content).components(|c| c))
    }).await?;

    Ok(())
}
