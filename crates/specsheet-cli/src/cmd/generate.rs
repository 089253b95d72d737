use anyhow::Context;
use clap::{Args, ValueEnum};
use gemini_agent::cancellation;
use specsheet_core::config::Config;
use specsheet_core::prompt::{
    compose_idea, strip_fences, validate_idea, DeployEnvironment, GenerationOptions, Language,
    ProductType,
};
use specsheet_server::generator::agent_from_settings;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::output::print_json;

#[derive(Args)]
pub struct GenerateArgs {
    /// The product idea
    pub idea: String,

    #[arg(long, value_enum)]
    pub product_type: Option<ProductTypeArg>,

    #[arg(long = "deploy", value_enum)]
    pub deploy: Option<DeployArg>,

    #[arg(long, value_enum)]
    pub language: Option<LanguageArg>,

    /// Write the specification to this file instead of stdout
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ProductTypeArg {
    WebApp,
    AiAgent,
    Other,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DeployArg {
    Vercel,
    Gcp,
    Azure,
    Aws,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LanguageArg {
    Typescript,
    Nodejs,
    Python,
    Go,
}

impl From<ProductTypeArg> for ProductType {
    fn from(v: ProductTypeArg) -> Self {
        match v {
            ProductTypeArg::WebApp => ProductType::WebApp,
            ProductTypeArg::AiAgent => ProductType::AiAgent,
            ProductTypeArg::Other => ProductType::Other,
        }
    }
}

impl From<DeployArg> for DeployEnvironment {
    fn from(v: DeployArg) -> Self {
        match v {
            DeployArg::Vercel => DeployEnvironment::Vercel,
            DeployArg::Gcp => DeployEnvironment::Gcp,
            DeployArg::Azure => DeployEnvironment::Azure,
            DeployArg::Aws => DeployEnvironment::Aws,
        }
    }
}

impl From<LanguageArg> for Language {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::Typescript => Language::Typescript,
            LanguageArg::Nodejs => Language::Nodejs,
            LanguageArg::Python => Language::Python,
            LanguageArg::Go => Language::Go,
        }
    }
}

pub fn run(config_path: Option<&Path>, args: GenerateArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load_with_env(config_path).context("failed to load config")?;
    let idea = validate_idea(&args.idea, config.server.max_idea_chars)?;
    let options = GenerationOptions {
        product_type: args.product_type.map(Into::into),
        deploy_environment: args.deploy.map(Into::into),
        language: args.language.map(Into::into),
    };
    let prompt = compose_idea(idea, &options);
    let agent = agent_from_settings(&config.generation);

    let rt = tokio::runtime::Runtime::new()?;
    let raw = rt.block_on(async {
        let (handle, cancel) = cancellation();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });
        agent.generate_spec(&prompt, &cancel).await
    })?;
    let spec = strip_fences(&raw);

    match &args.out {
        Some(path) => {
            std::fs::write(path, &spec)
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!(path = %path.display(), "specification written");
            if json {
                print_json(&serde_json::json!({ "path": path, "chars": spec.len() }))?;
            } else {
                println!("Wrote {}", path.display());
            }
        }
        None if json => print_json(&serde_json::json!({ "spec": spec }))?,
        None => println!("{spec}"),
    }
    Ok(())
}
