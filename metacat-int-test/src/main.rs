use metacat::common::{EntityType, MetaValue};
use metacat::errors::MetaResult;
use metacat::listing::ListOptions;
use metacat::plugin::PluginSelector;
use metacat_int_test::test_util::{create_test_context, id, meta};

fn main() -> MetaResult<()> {
    println!("Starting stress run...");
    let ctx = create_test_context()?;
    let catalog = ctx.catalog();

    let count: i64 = 100_000;
    let dataset = id("stress_dataset");
    ctx.register(&dataset, EntityType::Dataset);

    let start = std::time::Instant::now();
    for index in 0..count {
        let file = id(&format!("stress_file_{}", index));
        ctx.attach(&dataset, &file, EntityType::File);
        catalog.set_metadata_bulk(
            &file,
            &meta(&[
                ("bytes", MetaValue::I64(1024)),
                ("project", MetaValue::from("stress")),
                ("custom_tag", MetaValue::from(format!("tag_{}", index % 64).as_str())),
            ]),
            false,
        )?;
    }
    println!("Wrote {} entities in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let entries = catalog.list_entities(
        &serde_json::json!({"project": "stress", "bytes.gte": 1024}),
        &ListOptions::new(),
    )?;
    println!("Listed {} entities in {:?}", entries.len(), start.elapsed());

    let start = std::time::Instant::now();
    let sample = catalog.get_metadata(&id("stress_file_0"), &PluginSelector::All)?;
    println!(
        "Read one entity ({} keys, dataset bytes aggregate intact: {}) in {:?}",
        sample.len(),
        catalog
            .get_metadata(&dataset, &PluginSelector::All)?
            .get("bytes")
            .and_then(|v| v.as_i64())
            .map(|b| b == 1024 * count)
            .unwrap_or(false),
        start.elapsed()
    );
    Ok(())
}
