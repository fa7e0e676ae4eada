use clap::Parser;
use roster_etl::core::ConfigProvider;
use roster_etl::utils::error::ErrorSeverity;
use roster_etl::utils::{logger, validation::Validate};
use roster_etl::{CliConfig, EtlEngine, LocalStorage, OllamaClient, RosterPipeline, TomlConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting roster-etl");

    // 有指定 TOML 檔就以檔案為準
    match cli.config.clone() {
        Some(path) => match TomlConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!("📄 Loaded configuration from {}", path);
                run(config, cli.verbose).await
            }
            Err(e) => {
                tracing::error!("❌ Failed to load configuration: {}", e);
                eprintln!("❌ {}", e.user_friendly_message());
                std::process::exit(1);
            }
        },
        None => {
            let verbose = cli.verbose;
            run(cli, verbose).await
        }
    }
}

async fn run<C>(config: C, verbose: bool) -> anyhow::Result<()>
where
    C: ConfigProvider + Validate + std::fmt::Debug + 'static,
{
    if verbose {
        tracing::debug!("Config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    // 創建存儲、模型客戶端和管道
    let storage = LocalStorage::default();
    let client = OllamaClient::new(config.model_endpoint());
    tracing::info!(
        "🤖 Using model '{}' at {}",
        config.model_name(),
        client.endpoint()
    );
    let pipeline = RosterPipeline::new(storage, client, config);

    let engine = EtlEngine::new(pipeline);

    match engine.run().await {
        Ok(Some(output_path)) => {
            tracing::info!("✅ Roster extraction completed");
            println!("Excel file created: {}", output_path);
        }
        Ok(None) => {
            tracing::warn!("⚠️ No transactions extracted, spreadsheet left untouched");
            eprintln!("Failed to extract JSON from the response.");
            std::process::exit(1);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Roster extraction failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2, // 檔案鎖定或模型連線問題，可重試
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3, // 配置錯誤
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
