fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/mads.proto");

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]")
        .type_attribute(".", "#[serde(default)]")
        .field_attribute(
            ".mads.v1.TypedPayload.value",
            "#[serde(with = \"crate::proto::base64_bytes\")]",
        )
        // Maps must encode deterministically: payload bytes feed the content version.
        .btree_map(["."])
        .compile_protos(&["proto/mads.proto"], &["proto"])
        .unwrap_or_else(|e| panic!("protobuf compile error: {}", e));

    Ok(())
}
