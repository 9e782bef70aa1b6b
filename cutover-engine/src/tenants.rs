//! Tenant discovery and per-tenant fan-out.

use std::future::Future;

use cutover_core::{CollectionPath, CutoverResult, OrgId};
use cutover_storage::DocumentStore;
use futures_util::stream::{self, StreamExt, TryStreamExt};

/// The single requested tenant, or every document id under `organisations`.
pub async fn resolve_tenants<S: DocumentStore + ?Sized>(
    store: &S,
    org: Option<&OrgId>,
) -> CutoverResult<Vec<OrgId>> {
    if let Some(org) = org {
        return Ok(vec![org.clone()]);
    }
    let orgs = store.list(&CollectionPath::organisations()).await?;
    let ids = orgs
        .iter()
        .map(|doc| OrgId::parse(doc.id().as_str()))
        .collect::<CutoverResult<Vec<_>>>()?;
    tracing::info!(org_count = ids.len(), "Discovered tenants");
    Ok(ids)
}

/// Run `f` for each tenant with up to `concurrency` tenants in flight.
///
/// Results come back in input order. The first error stops the run.
pub async fn for_each_tenant<T, F, Fut>(
    orgs: Vec<OrgId>,
    concurrency: usize,
    f: F,
) -> CutoverResult<Vec<T>>
where
    F: FnMut(OrgId) -> Fut,
    Fut: Future<Output = CutoverResult<T>>,
{
    stream::iter(orgs)
        .map(f)
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_core::{CutoverError, DocumentPath, ValidationError};
    use cutover_storage::MemoryStore;

    #[tokio::test]
    async fn test_explicit_org_skips_discovery() {
        let store = MemoryStore::new();
        let org = OrgId::parse("orgA").unwrap();
        assert_eq!(resolve_tenants(&store, Some(&org)).await.unwrap(), vec![org]);
    }

    #[tokio::test]
    async fn test_discovers_org_documents() {
        let store = MemoryStore::new();
        for id in ["orgB", "orgA"] {
            let org = OrgId::parse(id).unwrap();
            store
                .insert(&DocumentPath::organisation(&org), Default::default())
                .unwrap();
        }
        let orgs = resolve_tenants(&store, None).await.unwrap();
        let ids: Vec<&str> = orgs.iter().map(|o| o.as_str()).collect();
        assert_eq!(ids, vec!["orgA", "orgB"]);
    }

    #[tokio::test]
    async fn test_for_each_tenant_keeps_order() {
        let orgs: Vec<OrgId> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| OrgId::parse(*id).unwrap())
            .collect();
        let out = for_each_tenant(orgs, 3, |org| async move { Ok(org.to_string()) })
            .await
            .unwrap();
        assert_eq!(out, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_for_each_tenant_stops_on_error() {
        let orgs = vec![OrgId::parse("a").unwrap(), OrgId::parse("b").unwrap()];
        let result: CutoverResult<Vec<()>> = for_each_tenant(orgs, 1, |org| async move {
            if org.as_str() == "b" {
                Err(ValidationError::UnsafeRetirement.into())
            } else {
                Ok(())
            }
        })
        .await;
        assert!(matches!(result, Err(CutoverError::Validation(_))));
    }
}
