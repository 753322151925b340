use std::sync::Arc;

use shipquote_db::repositories::{SqlProductRepository, SqlRateRepository};
use shipquote_db::EstimateService;

use crate::commands::{open_pool, prepare, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("methods") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let service = EstimateService::new(
            Arc::new(SqlRateRepository::new(pool.clone())),
            Arc::new(SqlProductRepository::new(pool.clone())),
            config.shipping.clone(),
        );
        let methods = service
            .list_methods()
            .await
            .map_err(|error| ("estimate_unavailable", error.to_string(), 4u8));
        pool.close().await;
        methods
    });

    let methods = match result {
        Ok(methods) => methods,
        Err(failure) => return CommandResult::from_failure("methods", failure),
    };

    match serde_json::to_value(&methods) {
        Ok(data) => CommandResult::success_with_data(
            "methods",
            format!("{} active shipping methods", methods.len()),
            Some(data),
        ),
        Err(error) => {
            let failure: CommandFailure = ("serialization", error.to_string(), 3);
            CommandResult::from_failure("methods", failure)
        }
    }
}
