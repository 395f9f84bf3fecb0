//! The volume registry.
//!
//! Every operation takes one exclusive lock for its whole duration,
//! including any attach or detach it triggers. Volume operations follow
//! container lifecycle events, so throughput is not a concern.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use telemount_common::{TelemountError, TelemountPaths, TelemountResult};
use tokio::sync::Mutex;

use super::{Endpoint, PhysicalMount, VolumeDescriptor, VolumeOptions};
use crate::mounter::Mounter;

/// Owns every physical mount and the volumes below them.
pub struct Registry {
    paths: TelemountPaths,
    mounter: Arc<dyn Mounter>,
    mounts: Mutex<HashMap<Endpoint, PhysicalMount>>,
}

/// Visibility of the volumes a driver manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Volumes exist on this host only.
    Local,
}

/// Static driver capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    /// Volume scope.
    pub scope: Scope,
}

/// Result of a successful unmount.
#[derive(Debug)]
pub enum UnmountOutcome {
    /// The consumer was released; the physical mount is still needed.
    Released,
    /// The consumer was the last one on its physical mount, which was detached.
    Detached,
    /// The consumer was released but the idle physical mount could not be
    /// detached. It stays marked attached.
    DetachFailed(TelemountError),
}

impl Registry {
    /// Create an empty registry rooting physical mounts under
    /// `paths.volume_root`.
    pub fn new(paths: TelemountPaths, mounter: Arc<dyn Mounter>) -> Self {
        Self {
            paths,
            mounter,
            mounts: Mutex::new(HashMap::new()),
        }
    }

    /// Define a volume.
    ///
    /// The physical mount for the volume's endpoint is created on first use
    /// of that endpoint. Nothing is attached yet. Defining a name again with
    /// the same endpoint and path is accepted and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an option error (see [`VolumeOptions::parse`]) or
    /// [`TelemountError::VolumeExists`] if the name is taken by a different
    /// definition.
    pub async fn create_volume(
        &self,
        name: &str,
        options: &HashMap<String, String>,
    ) -> TelemountResult<()> {
        tracing::debug!(volume = name, ?options, "Create");
        let VolumeOptions { endpoint, sub_path } = VolumeOptions::parse(options)?;

        let mut mounts = self.mounts.lock().await;
        if let Some(existing) = mounts.values().find(|m| m.volume(name).is_some()) {
            let same = existing.endpoint() == &endpoint
                && existing
                    .volume(name)
                    .is_some_and(|v| v.sub_path() == sub_path);
            if same {
                tracing::debug!(volume = name, "Volume already defined");
                return Ok(());
            }
            return Err(TelemountError::VolumeExists {
                name: name.to_string(),
            });
        }

        let mount = mounts.entry(endpoint.clone()).or_insert_with(|| {
            let mount_point = self
                .paths
                .endpoint_mount_point(endpoint.host(), endpoint.port());
            tracing::debug!(%endpoint, mount_point = %mount_point.display(), "New physical mount");
            PhysicalMount::new(endpoint.clone(), mount_point)
        });
        mount.add_volume(name, &sub_path);

        tracing::info!(
            volume = name,
            %endpoint,
            sub_path = %sub_path.display(),
            "Volume created"
        );
        Ok(())
    }

    /// Delete an unused volume.
    ///
    /// # Errors
    ///
    /// Returns [`TelemountError::VolumeNotFound`] or, if containers still hold
    /// the volume, [`TelemountError::VolumeBusy`]. Nothing changes on error.
    pub async fn remove_volume(&self, name: &str) -> TelemountResult<()> {
        tracing::debug!(volume = name, "Remove");
        let mut mounts = self.mounts.lock().await;
        let mount = owner_mut(&mut mounts, name)?;

        if let Some(volume) = mount.volume(name).filter(|v| v.in_use()) {
            return Err(TelemountError::VolumeBusy {
                name: name.to_string(),
                containers: volume.used_by().to_vec(),
            });
        }
        mount.delete_volume(name);

        tracing::info!(volume = name, "Volume removed");
        Ok(())
    }

    /// Mount a volume for `container` and return its host path.
    ///
    /// Attaches the physical mount if needed. Mounting the same container
    /// twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`TelemountError::VolumeNotFound`] or
    /// [`TelemountError::AttachFailed`]. On attach failure the container is
    /// not recorded.
    pub async fn mount_volume(&self, name: &str, container: &str) -> TelemountResult<PathBuf> {
        tracing::debug!(volume = name, container, "Mount");
        let mut mounts = self.mounts.lock().await;
        let mount = owner_mut(&mut mounts, name)?;

        mount.ensure_attached(self.mounter.as_ref()).await?;

        let mount_point = mount.mount_point().to_path_buf();
        let volume = mount.volume_mut(name).ok_or_else(|| not_found(name))?;
        if volume.add_consumer(container) {
            tracing::debug!(volume = name, container, "Volume in use");
        }
        Ok(volume.mount_point(&mount_point))
    }

    /// Host path of a volume.
    ///
    /// # Errors
    ///
    /// Returns [`TelemountError::VolumeNotFound`].
    pub async fn path_of(&self, name: &str) -> TelemountResult<PathBuf> {
        tracing::debug!(volume = name, "Path");
        let mounts = self.mounts.lock().await;
        let mount = owner(&mounts, name)?;
        let volume = mount.volume(name).ok_or_else(|| not_found(name))?;
        Ok(volume.mount_point(mount.mount_point()))
    }

    /// Release `container`'s hold on a volume.
    ///
    /// When the volume's last consumer leaves and no other volume on the same
    /// physical mount is in use, the physical mount is detached. A failed
    /// detach does not undo the release; it is returned as
    /// [`UnmountOutcome::DetachFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`TelemountError::VolumeNotFound`] or
    /// [`TelemountError::NotMounted`].
    pub async fn unmount_volume(
        &self,
        name: &str,
        container: &str,
    ) -> TelemountResult<UnmountOutcome> {
        tracing::debug!(volume = name, container, "Unmount");
        let mut mounts = self.mounts.lock().await;
        let mount = owner_mut(&mut mounts, name)?;

        let volume = mount.volume_mut(name).ok_or_else(|| not_found(name))?;
        if !volume.remove_consumer(container) {
            return Err(TelemountError::NotMounted {
                name: name.to_string(),
                container: container.to_string(),
            });
        }
        if volume.in_use() {
            return Ok(UnmountOutcome::Released);
        }

        match mount.maybe_detach(self.mounter.as_ref()).await {
            Ok(()) if mount.is_attached() => Ok(UnmountOutcome::Released),
            Ok(()) => Ok(UnmountOutcome::Detached),
            Err(err) => {
                tracing::warn!(
                    volume = name,
                    endpoint = %mount.endpoint(),
                    error = %err,
                    "Leaving idle remote filesystem attached"
                );
                Ok(UnmountOutcome::DetachFailed(err))
            }
        }
    }

    /// Snapshot of one volume.
    ///
    /// # Errors
    ///
    /// Returns [`TelemountError::VolumeNotFound`].
    pub async fn describe(&self, name: &str) -> TelemountResult<VolumeDescriptor> {
        tracing::debug!(volume = name, "Get");
        let mounts = self.mounts.lock().await;
        let mount = owner(&mounts, name)?;
        let volume = mount.volume(name).ok_or_else(|| not_found(name))?;
        Ok(volume.descriptor(name, mount.mount_point()))
    }

    /// Snapshot of every volume, sorted by name.
    pub async fn list_all(&self) -> Vec<VolumeDescriptor> {
        tracing::debug!("List");
        let mut descriptors = Vec::new();
        {
            let mounts = self.mounts.lock().await;
            for mount in mounts.values() {
                mount.append_descriptors(&mut descriptors);
            }
        }
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Static driver capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        Capabilities {
            scope: Scope::Local,
        }
    }

    /// Endpoints that have a physical mount, sorted.
    pub async fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self.mounts.lock().await.keys().cloned().collect();
        endpoints.sort();
        endpoints
    }

    /// Whether the physical mount for `endpoint` is attached.
    pub async fn is_attached(&self, endpoint: &Endpoint) -> bool {
        self.mounts
            .lock()
            .await
            .get(endpoint)
            .is_some_and(PhysicalMount::is_attached)
    }

    /// Detach every attached physical mount, whether in use or not.
    ///
    /// Consumer bookkeeping is left as is. Returns the detach failures.
    pub async fn shutdown(&self) -> Vec<TelemountError> {
        let mut mounts = self.mounts.lock().await;
        let mut failures = Vec::new();
        for mount in mounts.values_mut().filter(|m| m.is_attached()) {
            if let Err(err) = mount.detach(self.mounter.as_ref()).await {
                tracing::warn!(endpoint = %mount.endpoint(), error = %err, "Detach on shutdown failed");
                failures.push(err);
            }
        }
        failures
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("volume_root", &self.paths.volume_root)
            .finish_non_exhaustive()
    }
}

fn not_found(name: &str) -> TelemountError {
    TelemountError::VolumeNotFound {
        name: name.to_string(),
    }
}

/// The physical mount holding `name`. Names are unique, so the first hit wins.
fn owner<'a>(
    mounts: &'a HashMap<Endpoint, PhysicalMount>,
    name: &str,
) -> TelemountResult<&'a PhysicalMount> {
    mounts
        .values()
        .find(|m| m.volume(name).is_some())
        .ok_or_else(|| not_found(name))
}

fn owner_mut<'a>(
    mounts: &'a mut HashMap<Endpoint, PhysicalMount>,
    name: &str,
) -> TelemountResult<&'a mut PhysicalMount> {
    mounts
        .values_mut()
        .find(|m| m.volume(name).is_some())
        .ok_or_else(|| not_found(name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;

    use proptest::prelude::*;

    use super::*;
    use crate::mounter::testing::RecordingMounter;

    fn opts(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn registry(root: &Path) -> (Registry, Arc<RecordingMounter>) {
        let mounter = Arc::new(RecordingMounter::default());
        let registry = Registry::new(TelemountPaths::with_volume_root(root), mounter.clone());
        (registry, mounter)
    }

    #[test_log::test(tokio::test)]
    async fn mount_lifecycle_shares_one_attachment() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, mounter) = registry(temp.path());
        let endpoint = Endpoint::new("localhost", 2222);

        registry
            .create_volume("v1", &opts(&[("container", "proj"), ("port", "2222")]))
            .await
            .unwrap();
        assert!(!registry.is_attached(&endpoint).await);

        let expected = temp.path().join("localhost/2222/proj");
        assert_eq!(registry.mount_volume("v1", "c1").await.unwrap(), expected);
        assert_eq!(registry.mount_volume("v1", "c2").await.unwrap(), expected);
        assert_eq!(mounter.attach_count(), 1);
        assert_eq!(
            registry.describe("v1").await.unwrap().status.containers,
            ["c1", "c2"]
        );

        let outcome = registry.unmount_volume("v1", "c1").await.unwrap();
        assert!(matches!(outcome, UnmountOutcome::Released));
        assert!(registry.is_attached(&endpoint).await);

        let outcome = registry.unmount_volume("v1", "c2").await.unwrap();
        assert!(matches!(outcome, UnmountOutcome::Detached));
        assert!(!registry.is_attached(&endpoint).await);
        assert_eq!(mounter.detach_count(), 1);
    }

    #[tokio::test]
    async fn mounting_same_container_twice_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, _) = registry(temp.path());
        registry
            .create_volume("v1", &opts(&[("container", "proj"), ("port", "2222")]))
            .await
            .unwrap();

        registry.mount_volume("v1", "c1").await.unwrap();
        registry.mount_volume("v1", "c1").await.unwrap();
        let described = registry.describe("v1").await.unwrap();
        assert_eq!(described.status.containers, ["c1"]);
        assert!(described.created_at.is_some());
    }

    #[tokio::test]
    async fn endpoints_are_shared_by_host_and_port() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, mounter) = registry(temp.path());
        registry
            .create_volume("a", &opts(&[("container", "x"), ("port", "2222")]))
            .await
            .unwrap();
        registry
            .create_volume("b", &opts(&[("container", "y"), ("port", "2222")]))
            .await
            .unwrap();
        assert_eq!(registry.endpoints().await, [Endpoint::new("localhost", 2222)]);

        registry
            .create_volume("c", &opts(&[("container", "x"), ("port", "2223")]))
            .await
            .unwrap();
        assert_eq!(
            registry.endpoints().await,
            [
                Endpoint::new("localhost", 2222),
                Endpoint::new("localhost", 2223)
            ]
        );

        // Two volumes on one endpoint: one attach, detach only after both idle.
        registry.mount_volume("a", "c1").await.unwrap();
        registry.mount_volume("b", "c2").await.unwrap();
        assert_eq!(mounter.attach_count(), 1);
        registry.unmount_volume("a", "c1").await.unwrap();
        assert!(registry.is_attached(&Endpoint::new("localhost", 2222)).await);
        registry.unmount_volume("b", "c2").await.unwrap();
        assert!(!registry.is_attached(&Endpoint::new("localhost", 2222)).await);
    }

    #[tokio::test]
    async fn create_rejects_conflicting_redefinition() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, _) = registry(temp.path());
        let options = opts(&[("container", "proj"), ("port", "2222")]);
        registry.create_volume("v1", &options).await.unwrap();
        registry.create_volume("v1", &options).await.unwrap();

        let err = registry
            .create_volume("v1", &opts(&[("container", "proj"), ("port", "2223")]))
            .await
            .unwrap_err();
        assert!(matches!(err, TelemountError::VolumeExists { .. }));
        assert_eq!(registry.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn create_validates_options() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, _) = registry(temp.path());

        let err = registry
            .create_volume("v1", &opts(&[("container", "proj")]))
            .await
            .unwrap_err();
        assert!(matches!(err, TelemountError::MissingOption { .. }));

        let err = registry
            .create_volume("v1", &opts(&[("container", "proj"), ("port", "99999")]))
            .await
            .unwrap_err();
        assert!(matches!(err, TelemountError::InvalidPort { .. }));

        assert!(registry.list_all().await.is_empty());
        assert!(registry.endpoints().await.is_empty());
    }

    #[tokio::test]
    async fn remove_busy_volume_changes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, _) = registry(temp.path());
        registry
            .create_volume("v1", &opts(&[("container", "proj"), ("port", "2222")]))
            .await
            .unwrap();
        registry.mount_volume("v1", "c1").await.unwrap();

        let err = registry.remove_volume("v1").await.unwrap_err();
        match err {
            TelemountError::VolumeBusy { containers, .. } => assert_eq!(containers, ["c1"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            registry.describe("v1").await.unwrap().status.containers,
            ["c1"]
        );

        registry.unmount_volume("v1", "c1").await.unwrap();
        registry.remove_volume("v1").await.unwrap();
        assert!(matches!(
            registry.describe("v1").await.unwrap_err(),
            TelemountError::VolumeNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn unknown_names_and_consumers() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, _) = registry(temp.path());

        assert!(matches!(
            registry.mount_volume("nope", "c1").await.unwrap_err(),
            TelemountError::VolumeNotFound { .. }
        ));
        assert!(matches!(
            registry.remove_volume("nope").await.unwrap_err(),
            TelemountError::VolumeNotFound { .. }
        ));
        assert!(matches!(
            registry.path_of("nope").await.unwrap_err(),
            TelemountError::VolumeNotFound { .. }
        ));

        registry
            .create_volume("v1", &opts(&[("container", "proj"), ("port", "2222")]))
            .await
            .unwrap();
        assert!(matches!(
            registry.unmount_volume("v1", "c9").await.unwrap_err(),
            TelemountError::NotMounted { .. }
        ));
    }

    #[tokio::test]
    async fn attach_failure_records_no_consumer() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, mounter) = registry(temp.path());
        registry
            .create_volume("v1", &opts(&[("container", "proj"), ("port", "2222")]))
            .await
            .unwrap();

        mounter.fail_attach(true);
        let err = registry.mount_volume("v1", "c1").await.unwrap_err();
        assert!(matches!(err, TelemountError::AttachFailed { .. }));
        let described = registry.describe("v1").await.unwrap();
        assert!(described.status.containers.is_empty());
        assert!(described.created_at.is_none());
        assert!(!registry.is_attached(&Endpoint::new("localhost", 2222)).await);

        mounter.fail_attach(false);
        registry.mount_volume("v1", "c1").await.unwrap();
        assert!(registry.is_attached(&Endpoint::new("localhost", 2222)).await);
    }

    #[test_log::test(tokio::test)]
    async fn detach_failure_still_releases_consumer() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, mounter) = registry(temp.path());
        registry
            .create_volume("v1", &opts(&[("container", "proj"), ("port", "2222")]))
            .await
            .unwrap();
        registry.mount_volume("v1", "c1").await.unwrap();

        mounter.fail_detach(true);
        let outcome = registry.unmount_volume("v1", "c1").await.unwrap();
        assert!(matches!(outcome, UnmountOutcome::DetachFailed(ref e) if e.is_warning()));
        assert!(registry.describe("v1").await.unwrap().status.containers.is_empty());
        assert!(registry.is_attached(&Endpoint::new("localhost", 2222)).await);

        // The next consumer reuses the leaked attachment.
        registry.mount_volume("v1", "c2").await.unwrap();
        assert_eq!(mounter.attach_count(), 1);
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, _) = registry(temp.path());
        for (name, port) in [("zeta", "1"), ("alpha", "2"), ("mid", "1")] {
            registry
                .create_volume(name, &opts(&[("container", "c"), ("port", port)]))
                .await
                .unwrap();
        }
        let names: Vec<String> = registry
            .list_all()
            .await
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn path_and_describe_report_mount_point() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, _) = registry(temp.path());
        registry
            .create_volume(
                "v1",
                &opts(&[
                    ("container", "c"),
                    ("dir", "/x/y"),
                    ("host", "files"),
                    ("port", "22"),
                ]),
            )
            .await
            .unwrap();

        let expected = temp.path().join("files/22/c/x/y");
        assert_eq!(registry.path_of("v1").await.unwrap(), expected);
        let described = registry.describe("v1").await.unwrap();
        assert_eq!(described.mountpoint, expected);
        assert!(described.created_at.is_none());
    }

    #[tokio::test]
    async fn shutdown_detaches_everything() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, mounter) = registry(temp.path());
        for (name, port) in [("a", "1"), ("b", "2")] {
            registry
                .create_volume(name, &opts(&[("container", "c"), ("port", port)]))
                .await
                .unwrap();
            registry.mount_volume(name, "c1").await.unwrap();
        }

        assert!(registry.shutdown().await.is_empty());
        assert_eq!(mounter.detach_count(), 2);
        for endpoint in registry.endpoints().await {
            assert!(!registry.is_attached(&endpoint).await);
        }
    }

    #[test]
    fn capabilities_are_local() {
        let temp = tempfile::tempdir().unwrap();
        let (registry, _) = registry(temp.path());
        assert_eq!(
            serde_json::to_value(registry.capabilities()).unwrap(),
            serde_json::json!({ "Scope": "local" })
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Mount(usize, usize),
        Unmount(usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 0..4usize).prop_map(|(v, c)| Op::Mount(v, c)),
            (0..3usize, 0..4usize).prop_map(|(v, c)| Op::Unmount(v, c)),
        ]
    }

    proptest! {
        #[test]
        fn consumers_and_attachment_track_operations(ops in proptest::collection::vec(op(), 0..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let temp = tempfile::tempdir().unwrap();
                let (registry, _) = registry(temp.path());
                // "a" and "b" share an endpoint, "c" has its own.
                let volumes = [("a", "2222"), ("b", "2222"), ("c", "2223")];
                for (name, port) in volumes {
                    registry
                        .create_volume(name, &opts(&[("container", name), ("port", port)]))
                        .await
                        .unwrap();
                }
                let mut model: Vec<HashSet<usize>> = vec![HashSet::new(); volumes.len()];

                for op in ops {
                    match op {
                        Op::Mount(v, c) => {
                            registry.mount_volume(volumes[v].0, &format!("c{c}")).await.unwrap();
                            model[v].insert(c);
                        }
                        Op::Unmount(v, c) => {
                            let result = registry.unmount_volume(volumes[v].0, &format!("c{c}")).await;
                            if model[v].remove(&c) {
                                assert!(result.is_ok());
                            } else {
                                assert!(matches!(result, Err(TelemountError::NotMounted { .. })));
                            }
                        }
                    }

                    for (v, (name, _)) in volumes.iter().enumerate() {
                        let described = registry.describe(name).await.unwrap();
                        assert_eq!(described.status.containers.len(), model[v].len());
                    }
                    let shared_in_use = !model[0].is_empty() || !model[1].is_empty();
                    assert_eq!(
                        registry.is_attached(&Endpoint::new("localhost", 2222)).await,
                        shared_in_use
                    );
                    assert_eq!(
                        registry.is_attached(&Endpoint::new("localhost", 2223)).await,
                        !model[2].is_empty()
                    );
                }
            });
        }
    }
}
