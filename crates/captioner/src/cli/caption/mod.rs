//! The `captioner caption` command for generating captions.

mod batch;
mod types;

use captioner_core::{build_prompt, CaptionStore, Captioner, Config, ImageSource, SidecarStore};
use clap::Args;
use std::path::PathBuf;

use batch::run_batch;

/// Arguments for the `caption` command.
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image file or directory to caption
    #[arg(required = true)]
    pub input: PathBuf,

    /// Backend to use (defaults to generation.default_backend)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Prompt sent with every image (defaults to generation.prompt)
    #[arg(long)]
    pub prompt: Option<String>,

    /// Phrase every caption must start with
    #[arg(short, long)]
    pub trigger: Option<String>,

    /// Number of concurrent backend calls (defaults to generation.parallel)
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Leave images that already have a non-empty caption alone
    #[arg(long)]
    pub skip_existing: bool,

    /// Print one JSON record per image to stdout
    #[arg(long)]
    pub json: bool,
}

/// Settings resolved from arguments and configuration.
#[derive(Debug)]
pub(crate) struct CaptionPlan {
    pub backend: String,
    pub prompt: String,
    pub parallel: usize,
}

impl CaptionPlan {
    pub(crate) fn resolve(args: &CaptionArgs, config: &Config) -> anyhow::Result<Self> {
        let Some(backend) = args
            .backend
            .clone()
            .or_else(|| config.generation.default_backend.clone())
        else {
            anyhow::bail!(
                "No backend selected. Pass --backend or set generation.default_backend.\n  \
                 Run `captioner backends` to see what is configured."
            );
        };

        let base = args.prompt.as_deref().unwrap_or(&config.generation.prompt);
        let parallel = args.parallel.unwrap_or(config.generation.parallel);
        if parallel == 0 {
            anyhow::bail!("--parallel must be greater than 0");
        }

        Ok(Self {
            backend,
            prompt: build_prompt(base, args.trigger.as_deref()),
            parallel,
        })
    }
}

/// Execute the caption command.
pub async fn execute(args: CaptionArgs, config: Config) -> anyhow::Result<()> {
    let plan = CaptionPlan::resolve(&args, &config)?;
    let captioner = Captioner::new(config)?;
    let store = SidecarStore::new();

    let images = captioner.discovery().list_images(&args.input)?;
    if images.is_empty() {
        tracing::warn!("No supported images found at {:?}", args.input);
        return Ok(());
    }

    let (pending, skipped) = select_pending(&store, images, args.skip_existing)?;
    if skipped > 0 {
        tracing::info!("Skipping {skipped} images that already have captions");
    }
    if pending.is_empty() {
        tracing::info!("Nothing to caption");
        return Ok(());
    }

    tracing::info!(
        "Captioning {} images with {} (parallel {})",
        pending.len(),
        plan.backend,
        plan.parallel
    );
    tracing::debug!("Prompt: {}", plan.prompt);

    let stats = run_batch(&captioner, &store, &plan, pending, args.json).await?;
    stats.print_summary(skipped);

    if stats.failed > 0 {
        anyhow::bail!(
            "{} of {} images failed",
            stats.failed,
            stats.succeeded + stats.failed
        );
    }
    Ok(())
}

/// Drop images that already have a caption when `skip_existing` is set.
///
/// Returns the images to caption and how many were skipped.
fn select_pending(
    store: &dyn CaptionStore,
    images: Vec<PathBuf>,
    skip_existing: bool,
) -> anyhow::Result<(Vec<PathBuf>, usize)> {
    if !skip_existing {
        return Ok((images, 0));
    }

    let total = images.len();
    let mut pending = Vec::with_capacity(total);
    for image in images {
        if !store.has_caption(&image)? {
            pending.push(image);
        }
    }
    let skipped = total - pending.len();
    Ok((pending, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CaptionArgs {
        CaptionArgs {
            input: PathBuf::from("."),
            backend: None,
            prompt: None,
            trigger: None,
            parallel: None,
            skip_existing: false,
            json: false,
        }
    }

    #[test]
    fn test_plan_uses_config_defaults() {
        let config = Config::default();
        let plan = CaptionPlan::resolve(&args(), &config).unwrap();
        assert_eq!(Some(plan.backend.as_str()), config.generation.default_backend.as_deref());
        assert_eq!(plan.prompt, config.generation.prompt);
        assert_eq!(plan.parallel, config.generation.parallel);
    }

    #[test]
    fn test_plan_applies_overrides_and_trigger() {
        let config = Config::default();
        let args = CaptionArgs {
            backend: Some("pixtral".to_string()),
            prompt: Some("Describe the scene.".to_string()),
            trigger: Some("ohwx".to_string()),
            parallel: Some(2),
            ..args()
        };

        let plan = CaptionPlan::resolve(&args, &config).unwrap();
        assert_eq!(plan.backend, "pixtral");
        assert_eq!(plan.parallel, 2);
        assert!(plan.prompt.starts_with("Describe the scene."));
        assert!(plan.prompt.ends_with("'ohwx'"));
    }

    #[test]
    fn test_plan_requires_a_backend() {
        let mut config = Config::default();
        config.generation.default_backend = None;
        assert!(CaptionPlan::resolve(&args(), &config).is_err());

        let zero = CaptionArgs {
            backend: Some("pixtral".to_string()),
            parallel: Some(0),
            ..args()
        };
        assert!(CaptionPlan::resolve(&zero, &Config::default()).is_err());
    }

    #[test]
    fn test_select_pending_skips_captioned_images() {
        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("done.jpg");
        let blank = dir.path().join("blank.jpg");
        let fresh = dir.path().join("fresh.jpg");
        std::fs::write(dir.path().join("done.txt"), "A dog.").unwrap();
        std::fs::write(dir.path().join("blank.txt"), "\n").unwrap();

        let store = SidecarStore::new();
        let images = vec![blank.clone(), done.clone(), fresh.clone()];

        let (pending, skipped) = select_pending(&store, images.clone(), true).unwrap();
        assert_eq!(pending, vec![blank, fresh]);
        assert_eq!(skipped, 1);

        let (pending, skipped) = select_pending(&store, images, false).unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(skipped, 0);
    }
}
