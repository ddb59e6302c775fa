fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_root = "proto";
    let api_proto = format!("{proto_root}/deviceplugin/v1beta1/api.proto");

    // Tell Cargo to rerun if the proto file changes
    println!("cargo:rerun-if-changed={api_proto}");
    println!("cargo:rerun-if-env-changed=PROTOC");

    // Regenerate only when protoc is around, otherwise keep the checked-in bindings
    if !protoc_available() {
        println!("cargo:warning=protoc not found, using pre-generated device-plugin bindings");
        return Ok(());
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/proto")
        .compile_protos(&[&api_proto], &[proto_root])?;

    Ok(())
}

fn protoc_available() -> bool {
    let protoc = std::env::var("PROTOC").unwrap_or_else(|_| "protoc".to_string());
    std::process::Command::new(protoc)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
