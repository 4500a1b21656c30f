use std::sync::Arc;

use anyhow::Result;
use dog_axum::{axum, ContentApp};
use dog_blob::{ContentStore, FilesystemStore, S3CompatibleStore, S3Config};
use dog_content::{
    BinderConfig, ContentBinder, ContentConfig, ContentTypeDescriptor, DeclaredType, EntitySchema,
    MemoryRepository, StoreRegistry,
};
use serde_json::json;

pub const ENV_PREFIX: &str = "DOG_CONTENT__";

fn documents_schema() -> Result<EntitySchema> {
    Ok(EntitySchema::builder("documents")
        .property("attachment", DeclaredType::value("File"))
        .property("renditions", DeclaredType::list("File"))
        .property("pages", DeclaredType::fixed_array("Page"))
        .build()?)
}

/// A few documents to play with; the repository is in-memory only.
fn seed(repository: &MemoryRepository) -> Result<()> {
    for (id, title) in [("42", "Quarterly report"), ("43", "Site photos")] {
        repository.insert(
            "documents",
            json!({
                "id": id,
                "title": title,
                "attachment": null,
                "renditions": [],
                "pages": [],
            }),
        )?;
    }
    Ok(())
}

async fn open_store(config: &ContentConfig) -> Result<Arc<dyn ContentStore>> {
    let limits = config.blob_config()?;
    let kind = config.get("store.kind").unwrap_or("fs");
    let store: Arc<dyn ContentStore> = match kind {
        "s3" => Arc::new(S3CompatibleStore::new(S3Config::from_env()?, limits).await),
        "fs" => {
            let root = config.get("store.fs.root").unwrap_or("./data/documents");
            Arc::new(FilesystemStore::with_config(root, limits))
        }
        other => anyhow::bail!("unknown store.kind {other:?} (expected \"fs\" or \"s3\")"),
    };
    tracing::info!(store = kind, "documents store opened");
    Ok(store)
}

pub async fn build(config: &ContentConfig) -> Result<ContentApp> {
    let repository = Arc::new(MemoryRepository::new().with_collection("documents", documents_schema()?));
    seed(&repository)?;

    // Files and pages share one store
    let store = open_store(config).await?;
    let registry = StoreRegistry::builder()
        .content_type(ContentTypeDescriptor::standard("File"))
        .content_type(ContentTypeDescriptor::standard("Page"))
        .shared_store("File", Arc::clone(&store))
        .shared_store("Page", store)
        .build()?;

    let binder_config = BinderConfig::from_config(config)?;
    tracing::info!(
        delete_policy = ?binder_config.delete_policy,
        serialize_mutations = binder_config.serialize_mutations,
        "documents binder configured"
    );
    let binder = ContentBinder::with_config(repository, Arc::new(registry), binder_config);

    let max_body = usize::try_from(config.blob_config()?.max_blob_bytes).unwrap_or(usize::MAX);
    Ok(axum(binder)
        .service("/health", || async { "ok" })
        .with_body_limit(max_body))
}
