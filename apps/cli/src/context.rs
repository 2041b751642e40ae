use std::sync::Arc;

use anyhow::Context;
use survey_sync_core::metadata::{MetadataService, MetadataServiceTrait};
use survey_sync_core::session::{SessionProvider, StaticSession};
use survey_sync_core::settings::SyncSettings;
use survey_sync_core::surveys::{SurveyService, SurveyServiceTrait};
use survey_sync_crm::SalesforceClient;
use survey_sync_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, MetadataRepository, SurveyRepository,
};

use crate::config::Cli;

pub struct ServiceContext {
    pub settings: Arc<SyncSettings>,
    pub metadata_service: Arc<dyn MetadataServiceTrait>,
    pub survey_service: Arc<dyn SurveyServiceTrait>,
}

impl ServiceContext {
    pub fn initialize(cli: &Cli, settings: SyncSettings) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);
        let db_path = init(&cli.db_path)
            .with_context(|| format!("preparing database {}", cli.db_path.display()))?;
        run_migrations(&db_path).context("running database migrations")?;
        let pool = create_pool(&db_path).context("creating connection pool")?;
        let writer = spawn_writer(pool.as_ref().clone());
        let metadata_repository =
            Arc::new(MetadataRepository::new(pool.clone(), writer.clone()));
        let survey_repository = Arc::new(SurveyRepository::new(pool, writer));

        let session: Arc<dyn SessionProvider> = Arc::new(StaticSession {
            instance_url: cli.instance_url.trim().to_string(),
            access_token: cli.access_token.trim().to_string(),
            user_contact_id: cli.contact_id.trim().to_string(),
        });
        let crm = Arc::new(
            SalesforceClient::new(session.clone(), &settings).context("building HTTP client")?,
        );

        let metadata_service = Arc::new(MetadataService::new(
            crm.clone(),
            metadata_repository.clone(),
            settings.clone(),
        ));
        let survey_service = Arc::new(SurveyService::new(
            crm,
            metadata_repository,
            survey_repository,
            session,
            settings.clone(),
        ));

        Ok(Self {
            settings,
            metadata_service,
            survey_service,
        })
    }
}
