//! Emits the `Bundle` CustomResourceDefinition as YAML on stdout, for
//! `kubectl apply -f <(cargo run --bin crdgen)` during deployment.

use kube::CustomResourceExt;
use trust_bundle_controller::crd::Bundle;

fn main() -> anyhow::Result<()> {
    let crd = Bundle::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
