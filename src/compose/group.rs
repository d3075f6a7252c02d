//! Group expansion
//!
//! A group repository lists member repository names under
//! `settings.repositories`. Members are loaded and composed concurrently but
//! keep their declared order in the resulting `GroupSlice`.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::config::RepoConfig;
use crate::error::ComposeError;
use crate::slice::{GroupSlice, SharedSlice};
use crate::storage::StorageAliases;

use super::Composer;

/// Member names of a group, in declared order
pub fn members(config: &RepoConfig) -> Result<Vec<String>, ComposeError> {
    let malformed = |reason: &str| ComposeError::malformed(config.display_name(), reason);
    let list = config
        .settings()
        .ok_or_else(|| malformed("group requires settings"))?
        .get("repositories")
        .ok_or_else(|| malformed("group requires repositories"))?
        .as_sequence()
        .ok_or_else(|| malformed("repositories must be a list"))?;
    list.iter()
        .map(|member| {
            member
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed("repositories must be a list of names"))
        })
        .collect()
}

pub(super) async fn resolve(
    composer: &Composer,
    config: &RepoConfig,
    aliases: &StorageAliases,
    standalone: bool,
    chain: &[String],
) -> Result<SharedSlice, ComposeError> {
    let names = members(config)?;
    if let Some(repeated) = names.iter().find(|name| chain.contains(name)) {
        let mut cycle = chain.to_vec();
        cycle.push(repeated.clone());
        return Err(ComposeError::CyclicGroup(cycle));
    }

    let store = composer.settings().repositories();
    let slices = try_join_all(names.iter().map(|member| {
        let store = store.clone();
        let chain = chain.to_vec();
        async move {
            let wrap = |source: ComposeError| match source {
                cycle @ ComposeError::CyclicGroup(_) => cycle,
                source => ComposeError::GroupMember {
                    member: member.clone(),
                    source: Box::new(source),
                },
            };
            let member_config = store.config(member, aliases).await.map_err(wrap)?;
            composer
                .compose(&member_config, aliases, standalone, chain)
                .await
                .map_err(wrap)
        }
    }))
    .await?;

    debug!(group = %config.display_name(), members = ?names, "Resolved group");
    Ok(Arc::new(GroupSlice::new(slices)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AnonymousAuth, Authentication};
    use crate::client::HttpClient;
    use crate::config::{ConfigStore, HttpClientConfig, Layout};
    use crate::registry::ProtocolRegistry;
    use crate::settings::MockSettings;
    use crate::slice::SliceRequest;
    use crate::storage::{InMemoryStorage, Key, Storage};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Hands out configurations after a per-repository delay
    #[derive(Default)]
    struct DelayedStore {
        configs: HashMap<String, (RepoConfig, Duration)>,
        loaded: Mutex<Vec<String>>,
    }

    impl DelayedStore {
        fn with(mut self, config: RepoConfig, delay: Duration) -> Self {
            let name = config.name().unwrap_or_default().to_string();
            self.configs.insert(name, (config, delay));
            self
        }

        fn loaded(&self) -> Vec<String> {
            self.loaded.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConfigStore for DelayedStore {
        async fn config(
            &self,
            name: &str,
            _aliases: &StorageAliases,
        ) -> Result<RepoConfig, ComposeError> {
            let (config, delay) = self
                .configs
                .get(name)
                .cloned()
                .ok_or_else(|| ComposeError::RepoNotFound(name.to_string()))?;
            tokio::time::sleep(delay).await;
            self.loaded.lock().unwrap().push(name.to_string());
            Ok(config)
        }

        async fn names(&self) -> Result<Vec<String>, ComposeError> {
            let mut names: Vec<String> = self.configs.keys().cloned().collect();
            names.sort();
            Ok(names)
        }
    }

    fn composer(store: Arc<DelayedStore>) -> Composer {
        let mut settings = MockSettings::new();
        settings
            .expect_auth()
            .returning(|| Ok(Arc::new(AnonymousAuth) as Arc<dyn Authentication>));
        settings.expect_layout().return_const(Layout::Flat);
        settings
            .expect_repositories()
            .returning(move || store.clone() as Arc<dyn ConfigStore>);
        Composer::new(
            Arc::new(settings),
            Arc::new(ProtocolRegistry::with_defaults()),
            Arc::new(HttpClient::start(&HttpClientConfig::default()).unwrap()),
        )
    }

    async fn maven_with(name: &str, content: &'static str) -> RepoConfig {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .save(&Key::new("lib.jar").unwrap(), Bytes::from(content))
            .await
            .unwrap();
        RepoConfig::new("maven").with_name(name).with_storage(storage)
    }

    fn group(settings: &str) -> RepoConfig {
        RepoConfig::new("maven-group")
            .with_name("all")
            .with_settings(serde_yaml::from_str(settings).unwrap())
    }

    #[test]
    fn test_members_keep_order() {
        let config = group("repositories: [central, internal, snapshots]\n");
        assert_eq!(
            members(&config).unwrap(),
            vec!["central", "internal", "snapshots"]
        );
    }

    #[test]
    fn test_members_without_settings() {
        let err = members(&RepoConfig::new("maven-group")).unwrap_err();
        assert!(matches!(err, ComposeError::MalformedSettings { .. }));
    }

    #[test]
    fn test_members_must_be_a_list() {
        for settings in ["other: 1\n", "repositories: central\n", "repositories: [a, [b]]\n"] {
            let err = members(&group(settings)).unwrap_err();
            assert!(
                matches!(err, ComposeError::MalformedSettings { ref repo, .. } if repo == "all"),
                "{}",
                settings
            );
        }
    }

    #[test]
    fn test_empty_group() {
        assert!(members(&group("repositories: []\n")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declared_order_survives_late_members() {
        let store = Arc::new(
            DelayedStore::default()
                .with(maven_with("first", "from first").await, Duration::from_millis(100))
                .with(maven_with("second", "from second").await, Duration::ZERO),
        );
        let config = group("repositories: [first, second]\n");

        let slice = composer(store.clone())
            .build(&config, &StorageAliases::new(), false)
            .await
            .unwrap();

        assert_eq!(store.loaded(), vec!["second", "first"]);
        let response = slice.response(&SliceRequest::get("/all/lib.jar")).await;
        assert_eq!(response.into_response().body, Bytes::from("from first"));
    }

    #[tokio::test]
    async fn test_late_member_failure_fails_group() {
        let store = Arc::new(
            DelayedStore::default()
                .with(maven_with("first", "from first").await, Duration::ZERO)
                .with(
                    RepoConfig::new("cargo").with_name("slow"),
                    Duration::from_millis(50),
                ),
        );
        let config = group("repositories: [first, slow]\n");

        let err = composer(store)
            .build(&config, &StorageAliases::new(), false)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ComposeError::GroupMember { ref member, .. } if member == "slow"));
        assert!(matches!(err.root(), ComposeError::UnsupportedType(_)));
    }
}
