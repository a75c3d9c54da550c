use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ns_core::{validate_description, validate_namespace_name, ResourceLimits, ResourceQuantity};
use ns_generator::{ManifestGenerator, DEFAULT_SHARED_NAMESPACES};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ns-generator")]
#[command(about = "Render the manifests for a provisioned namespace without contacting a cluster")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a namespace request and print its manifests
    Render {
        /// Namespace name (3-63 lowercase alphanumeric characters or '-')
        #[arg(long)]
        name: String,

        /// Human-readable description stored as an annotation
        #[arg(long)]
        description: Option<String>,

        #[arg(long, default_value = "100m")]
        cpu_request: String,

        #[arg(long, default_value = "500m")]
        cpu_limit: String,

        #[arg(long, default_value = "128Mi")]
        memory_request: String,

        #[arg(long, default_value = "256Mi")]
        memory_limit: String,

        /// Skip the network isolation policy
        #[arg(long)]
        no_isolation: bool,

        /// Namespace allowed through isolation (repeatable; defaults to ingress-nginx and monitoring)
        #[arg(long = "shared-namespace")]
        shared_namespaces: Vec<String>,

        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,

        /// Output file (default: stdout)
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Render {
            name,
            description,
            cpu_request,
            cpu_limit,
            memory_request,
            memory_limit,
            no_isolation,
            shared_namespaces,
            format,
            output,
        } => {
            let limits = ResourceLimits::new(
                ResourceQuantity::new(cpu_request, cpu_limit),
                ResourceQuantity::new(memory_request, memory_limit),
            );
            let rendered = render(
                &name,
                description.as_deref(),
                &limits,
                !no_isolation,
                shared_namespaces,
                format,
            )?;

            match output {
                Some(path) => fs::write(&path, rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{}", rendered),
            }
            Ok(())
        }
    }
}

fn render(
    name: &str,
    description: Option<&str>,
    limits: &ResourceLimits,
    network_isolated: bool,
    shared_namespaces: Vec<String>,
    format: Format,
) -> Result<String> {
    validate_namespace_name(name)?;
    if let Some(description) = description {
        validate_description(description)?;
    }
    limits.validate()?;

    let generator = if shared_namespaces.is_empty() {
        ManifestGenerator::new(DEFAULT_SHARED_NAMESPACES.iter().copied())
    } else {
        ManifestGenerator::new(shared_namespaces)
    };
    let set = generator.generate(name, description, limits, network_isolated);

    match format {
        Format::Yaml => Ok(set.to_yaml()?),
        Format::Json => Ok(serde_json::to_string_pretty(&set)? + "\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ResourceLimits {
        ResourceLimits::new(
            ResourceQuantity::new("100m", "500m"),
            ResourceQuantity::new("128Mi", "256Mi"),
        )
    }

    #[test]
    fn test_render_yaml() {
        let out = render("svc-api", None, &limits(), true, vec![], Format::Yaml).unwrap();
        assert!(out.contains("kind: Namespace"));
        assert!(out.contains("kind: LimitRange"));
        assert!(out.contains("ingress-nginx"));
    }

    #[test]
    fn test_render_json_with_custom_shared_namespaces() {
        let out = render(
            "svc-api",
            Some("api"),
            &limits(),
            true,
            vec!["gateway".to_string()],
            Format::Json,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["namespace"]["metadata"]["name"], "svc-api");
        assert!(out.contains("gateway"));
        assert!(!out.contains("ingress-nginx"));
    }

    #[test]
    fn test_render_rejects_invalid_input() {
        assert!(render("A", None, &limits(), true, vec![], Format::Yaml).is_err());

        let inverted = ResourceLimits::new(
            ResourceQuantity::new("1", "100m"),
            ResourceQuantity::new("128Mi", "256Mi"),
        );
        let err = render("svc-api", None, &inverted, true, vec![], Format::Yaml).unwrap_err();
        assert!(err.to_string().contains("limit ordering"));
    }

    #[test]
    fn test_render_command_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let args = Args::try_parse_from([
            "ns-generator",
            "render",
            "--name",
            "svc-api",
            "--memory-limit",
            "512Mi",
            "--no-isolation",
            path.to_str().unwrap(),
        ])
        .unwrap();

        run(args).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("name: svc-api"));
        assert!(written.contains("512Mi"));
        assert!(!written.contains("NetworkPolicy"));
    }

    #[test]
    fn test_render_command_rejects_bad_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let args = Args::try_parse_from([
            "ns-generator",
            "render",
            "--name",
            "Bad_Name",
            path.to_str().unwrap(),
        ])
        .unwrap();

        assert!(run(args).is_err());
        assert!(!path.exists());
    }
}
