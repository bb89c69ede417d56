//! Kubernetes manifest export
//!
//! Emits a `Deployment` running the package image and, when the package
//! exposes ports, a `Service` in front of it. The image reference matches the
//! tag written by the OCI exporter.

use homestead_core::PackageIdent;
use serde_json::{Value, json};

use crate::error::{ExportError, Result};
use crate::exporter::{ExportContext, ExportOutput, Exporter};
use crate::format::ExportFormat;
use crate::oci;

const MAX_NAME_LEN: usize = 63;

/// DNS-1123 label derived from a package name
pub fn resource_name(name: &str) -> String {
    let mut label: String = name
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    label.truncate(MAX_NAME_LEN);
    let label = label.trim_matches('-');
    if label.is_empty() {
        oci::FALLBACK_NAME.to_string()
    } else {
        label.to_string()
    }
}

/// Writes `<ident>.yaml` with a Deployment and an optional Service
#[derive(Debug, Clone)]
pub struct KubernetesExporter {
    pub replicas: u32,
}

impl Default for KubernetesExporter {
    fn default() -> Self {
        Self { replicas: 1 }
    }
}

impl KubernetesExporter {
    fn labels(ident: &PackageIdent) -> Value {
        json!({
            "app.kubernetes.io/name": resource_name(&ident.name),
            "app.kubernetes.io/managed-by": "homestead",
            "homestead.io/origin": ident.origin,
        })
    }

    fn deployment(&self, ident: &PackageIdent, exposes: &[u16]) -> Value {
        let name = resource_name(&ident.name);
        let labels = Self::labels(ident);
        let mut container = json!({
            "name": name,
            "image": oci::image_reference(ident),
        });
        if !exposes.is_empty() {
            container["ports"] = exposes
                .iter()
                .map(|port| json!({ "containerPort": port, "protocol": "TCP" }))
                .collect();
        }

        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": name,
                "labels": labels,
                "annotations": { "homestead.io/ident": ident.to_string() },
            },
            "spec": {
                "replicas": self.replicas,
                "selector": { "matchLabels": { "app.kubernetes.io/name": name } },
                "template": {
                    "metadata": { "labels": labels },
                    "spec": { "containers": [container] },
                },
            },
        })
    }

    fn service(ident: &PackageIdent, exposes: &[u16]) -> Value {
        let name = resource_name(&ident.name);
        let ports: Vec<Value> = exposes
            .iter()
            .map(|port| {
                json!({
                    "name": format!("tcp-{}", port),
                    "port": port,
                    "targetPort": port,
                    "protocol": "TCP",
                })
            })
            .collect();

        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": name, "labels": Self::labels(ident) },
            "spec": {
                "selector": { "app.kubernetes.io/name": name },
                "ports": ports,
            },
        })
    }
}

impl Exporter for KubernetesExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Kubernetes
    }

    fn export(&self, ctx: &ExportContext) -> Result<ExportOutput> {
        let manifest = ctx.artifact.manifest();
        if oci::platform(manifest.target).is_none() {
            return Err(ExportError::UnsupportedTarget {
                format: ExportFormat::Kubernetes,
                target: manifest.target,
            });
        }

        let ident = &manifest.ident;
        let mut documents = vec![self.deployment(ident, &manifest.exposes)];
        if !manifest.exposes.is_empty() {
            documents.push(Self::service(ident, &manifest.exposes));
        }

        let mut yaml = String::new();
        for doc in &documents {
            yaml.push_str("---\n");
            yaml.push_str(&serde_yaml::to_string(doc)?);
        }

        let path = ctx.out_dir().join(format!("{}.yaml", ident.dashed()));
        std::fs::create_dir_all(ctx.out_dir())?;
        std::fs::write(&path, yaml)?;

        tracing::debug!(%ident, documents = documents.len(), path = %path.display(), "exported kubernetes manifests");
        Ok(ExportOutput {
            format: ExportFormat::Kubernetes,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use homestead_core::PackageTarget;
    use serde::Deserialize;

    fn documents(path: &std::path::Path) -> Vec<serde_yaml::Value> {
        let content = std::fs::read_to_string(path).unwrap();
        serde_yaml::Deserializer::from_str(&content)
            .map(|doc| serde_yaml::Value::deserialize(doc).unwrap())
            .collect()
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name("redis"), "redis");
        assert_eq!(resource_name("My_App.v2"), "my-app-v2");
        assert_eq!(resource_name("_x_"), "x");
        assert_eq!(resource_name("___"), "package");
        assert_eq!(resource_name(&"a".repeat(80)).len(), 63);
    }

    #[test]
    fn test_deployment_and_service() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Linux);
        let output = KubernetesExporter::default().export(&ctx).unwrap();
        assert_eq!(
            output.path.file_name().unwrap().to_string_lossy(),
            "core-redis-7.2.4-20240101120000.yaml"
        );

        let docs = documents(&output.path);
        assert_eq!(docs.len(), 2);

        let deployment = &docs[0];
        assert_eq!(deployment["kind"].as_str(), Some("Deployment"));
        let container = &deployment["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(
            container["image"].as_str(),
            Some("core/redis:7.2.4-20240101120000")
        );
        assert_eq!(container["ports"][0]["containerPort"].as_u64(), Some(6379));

        let service = &docs[1];
        assert_eq!(service["kind"].as_str(), Some("Service"));
        assert_eq!(service["spec"]["ports"][0]["port"].as_u64(), Some(6379));
        assert_eq!(
            service["spec"]["selector"]["app.kubernetes.io/name"].as_str(),
            Some("redis")
        );
    }

    #[test]
    fn test_rejects_non_linux_target() {
        let fx = Fixture::new();
        let ctx = fx.redis_context(PackageTarget::X86_64Windows);
        assert!(matches!(
            KubernetesExporter::default().export(&ctx),
            Err(ExportError::UnsupportedTarget {
                format: ExportFormat::Kubernetes,
                ..
            })
        ));
        assert!(!ctx.out_dir().exists());
    }

    #[test]
    fn test_no_service_without_ports() {
        let fx = Fixture::new();
        let artifact = fx.artifact(
            "core/worker/1.0.0/20240101120000",
            PackageTarget::X86_64Linux,
            &[("bin/worker", "#!/bin/sh\n")],
            Some("bin/worker"),
            vec![],
        );
        let ctx = ExportContext::new(artifact, vec![], fx.out_dir());
        let exporter = KubernetesExporter { replicas: 3 };
        let docs = documents(&exporter.export(&ctx).unwrap().path);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["spec"]["replicas"].as_u64(), Some(3));
        assert!(docs[0]["spec"]["template"]["spec"]["containers"][0]
            .get("ports")
            .is_none());
    }
}
