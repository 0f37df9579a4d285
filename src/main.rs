use clap::Parser;
use flowline::utils::error::ErrorSeverity;
use flowline::utils::{logger, validation::Validate};
use flowline::{LocalStorage, Manifest, Pipeline, Source};

#[derive(Parser, Debug)]
#[command(name = "flowline", about = "Declarative ETL pipeline runner")]
struct Args {
    /// Pipeline 清單路徑
    #[arg(short, long, default_value = "flowline.toml")]
    config: String,

    /// 顯示 debug 層級日誌
    #[arg(short, long)]
    verbose: bool,

    /// 只解析並驗證清單，不執行載入
    #[arg(long)]
    dry_run: bool,

    /// 啟用系統資源監控
    #[arg(long)]
    monitor: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    tracing::info!("Starting flowline CLI");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    // 載入並驗證清單
    let manifest = match Manifest::from_file(&args.config) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::error!("❌ Failed to load manifest '{}': {}", args.config, e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if let Err(e) = manifest.validate() {
        tracing::error!("❌ Manifest validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Manifest loaded and validated successfully");

    // 顯示配置摘要
    display_manifest_summary(&manifest, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual loading will occur");
        perform_dry_run(&manifest);
        return Ok(());
    }

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 創建存儲和管道
    let storage = LocalStorage::new(manifest.destination.path.clone());
    let mut pipeline = Pipeline::new(
        manifest.pipeline.name.clone(),
        storage,
        manifest.pipeline.dataset_name.clone(),
    )
    .with_dev_mode(manifest.pipeline.dev_mode.unwrap_or(false))
    .with_monitoring(args.monitor);

    if let Some(refresh) = manifest.pipeline.refresh {
        pipeline = pipeline.with_refresh(refresh);
    }

    let sources = match manifest.build_sources() {
        Ok(sources) => sources,
        Err(e) => {
            tracing::error!("❌ Failed to build sources: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    let source_refs: Vec<&dyn Source> = sources.iter().map(|s| s.as_ref()).collect();

    match pipeline.run(&source_refs).await {
        Ok(load_info) => {
            tracing::info!("✅ Pipeline run completed successfully!");
            println!("{}", load_info);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Pipeline run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_manifest_summary(manifest: &Manifest, args: &Args) {
    println!("📋 Pipeline Summary:");
    println!("  Pipeline: {}", manifest.pipeline.name);
    if let Some(description) = &manifest.pipeline.description {
        println!("  Description: {}", description);
    }
    println!("  Dataset: {}", manifest.pipeline.dataset_name);
    println!("  Destination: {}", manifest.destination.path);
    println!(
        "  Dev Mode: {}",
        manifest.pipeline.dev_mode.unwrap_or(false)
    );
    if manifest.pipeline.refresh.is_some() {
        println!("  Refresh: drop_sources");
    }
    println!("  Sources: {}", manifest.sources.len());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(manifest: &Manifest) {
    println!("🔍 Dry Run Analysis:");
    println!();

    for (index, spec) in manifest.sources.iter().enumerate() {
        match spec {
            flowline::SourceSpec::RestApi {
                name,
                client,
                resources,
                resource_defaults,
            } => {
                println!(
                    "📡 Source {}: {} (rest_api)",
                    index + 1,
                    name.as_deref().unwrap_or("rest_api")
                );
                println!("  Endpoint: {}", client.base_url);
                println!("  Resources: {}", resources.len());
                if client.auth.is_some() {
                    println!("  Auth: configured");
                }
                if client.paginator.is_some() {
                    println!("  Paginator: configured at client level");
                }
                if resource_defaults.is_some() {
                    println!("  Resource defaults: configured");
                }
            }
            flowline::SourceSpec::Filesystem {
                name,
                bucket_url,
                file_glob,
                format,
                ..
            } => {
                println!(
                    "📁 Source {}: {} (filesystem)",
                    index + 1,
                    name.as_deref().unwrap_or("files")
                );
                println!("  Directory: {}", bucket_url);
                println!("  Glob: {}", file_glob);
                println!("  Format: {:?}", format);
            }
        }
        println!();
    }

    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
