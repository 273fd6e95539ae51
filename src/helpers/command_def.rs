use futures::future::BoxFuture;
use serenity::builder::CreateApplicationCommand;
use serenity::client::Context;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::id::GuildId;

pub type InteractionHandler = fn(Context, ApplicationCommandInteraction) -> BoxFuture<'static, anyhow::Result<()>>;

pub type CommandBuilder = fn(&mut CreateApplicationCommand) -> &mut CreateApplicationCommand;

pub struct CommandDef {
    pub name: &'static str,
    pub builder: CommandBuilder,
    pub handler: InteractionHandler,
    /// Re-create the command even if the guild already has one by this name.
    pub re_register: bool,
    /// `None` registers the command everywhere.
    pub whitelisted_servers: Option<&'static [GuildId]>,
}
