use anyhow::Result;

use deimos::prelude::*;

mod framework;

use framework::{builder, builder_in_pool};

#[test]
pub fn get_twice_hits_cache() -> Result<()> {
    let mut context = framework::make_context();
    let a = builder(0, &[1, 2, 3])?;
    let b = builder(0, &[1, 2, 3])?;

    let first = a.get_resource_table(&mut context.cache, None)?;
    let writes = context.device.stats()?.descriptor_writes;
    let second = b.get_resource_table(&mut context.cache, None)?;

    assert_eq!(first, second, "Equal content should give the same table");
    assert_eq!(
        context.device.stats()?.descriptor_writes,
        writes,
        "A cache hit should not write any descriptors"
    );
    assert_eq!(context.cache.cached_table_count(DescriptorPoolType::Resource), 1);
    Ok(())
}

#[test]
pub fn create_always_writes() -> Result<()> {
    let mut context = framework::make_context();
    let a = builder(0, &[1, 2])?;

    let first = a.create_resource_table(&mut context.cache, None)?;
    let second = a.create_resource_table(&mut context.cache, None)?;
    assert_eq!(context.device.stats()?.descriptor_writes, 2);
    assert_ne!(first.offset(), second.offset(), "Create should realize the content in new slots");

    // Both tables stay usable, the cache now resolves the content to the latest one.
    context.cache.validate_table(&first)?;
    context.cache.validate_table(&second)?;
    assert_eq!(context.device.read_table(&first)?, framework::descriptors(&[1, 2]));
    assert_eq!(context.device.read_table(&second)?, framework::descriptors(&[1, 2]));
    assert_eq!(a.get_resource_table(&mut context.cache, None)?, second);
    Ok(())
}

#[test]
pub fn different_content_gives_different_tables() -> Result<()> {
    let mut context = framework::make_context();
    let a = builder(0, &[1, 2])?.get_resource_table(&mut context.cache, None)?;
    let b = builder(0, &[2, 1])?.get_resource_table(&mut context.cache, None)?;
    let c = builder_in_pool(0, &[1, 2], 1)?.get_resource_table(&mut context.cache, None)?;
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(c.pool_index(), 1);
    assert_eq!(context.cache.cached_table_count(DescriptorPoolType::Resource), 3);
    Ok(())
}

#[test]
pub fn growth_keeps_cached_tables() -> Result<()> {
    let mut context = framework::make_context();
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Resource, 4, 0)?;

    let a = builder(0, &[10, 11])?;
    let b = builder(0, &[20, 21, 22])?;
    assert_ne!(a.key(), b.key());

    let old_a = a.get_resource_table(&mut context.cache, None)?;
    let table_b = b.get_resource_table(&mut context.cache, None)?;

    let pool = context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).unwrap();
    assert!(pool.capacity() >= 5, "Pool should have grown to fit both tables");
    assert_eq!(pool.generation(), 2);
    assert_eq!(context.cache.descriptor_count(DescriptorPoolType::Resource, 0), 5);
    assert_eq!(context.cache.cached_table_count(DescriptorPoolType::Resource), 2);

    // The old table is detectably stale, fetching it again by content gives the re-issued table.
    assert!(context.cache.validate_table(&old_a).is_err());
    let new_a = a.get_resource_table(&mut context.cache, None)?;
    context.cache.validate_table(&new_a)?;
    assert_eq!(new_a.offset(), old_a.offset());
    assert_ne!(new_a.handle(), old_a.handle());
    assert_eq!(context.device.read_table(&new_a)?, framework::descriptors(&[10, 11]));
    assert_eq!(context.device.read_table(&table_b)?, framework::descriptors(&[20, 21, 22]));
    Ok(())
}

#[test]
pub fn growth_reissues_every_table() -> Result<()> {
    let mut context =
        framework::make_context_with_settings(|settings| settings.initial_capacity(DescriptorPoolType::Resource, 3));
    let builders = (0..10u64)
        .map(|i| builder(0, &[i + 1, i + 100]))
        .collect::<Result<Vec<_>>>()?;
    for builder in &builders {
        builder.get_resource_table(&mut context.cache, None)?;
    }

    assert!(context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).unwrap().generation() > 1);
    for (i, builder) in builders.iter().enumerate() {
        let table = builder.get_resource_table(&mut context.cache, None)?;
        let i = i as u64;
        assert_eq!(context.device.read_table(&table)?, framework::descriptors(&[i + 1, i + 100]));
    }
    Ok(())
}

#[test]
pub fn pools_are_isolated_by_index() -> Result<()> {
    let mut context = framework::make_context();
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Resource, 2, 0)?;
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Resource, 2, 1)?;
    let other = builder_in_pool(0, &[7, 8], 1)?.get_resource_table(&mut context.cache, None)?;
    let other_pool = context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 1).unwrap().handle();

    builder(0, &[1, 2])?.get_resource_table(&mut context.cache, None)?;
    builder(0, &[3])?.get_resource_table(&mut context.cache, None)?;
    assert_eq!(context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).unwrap().generation(), 2);

    let pool = context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 1).unwrap();
    assert_eq!(pool.handle(), other_pool);
    assert_eq!(pool.generation(), 1);
    context.cache.validate_table(&other)?;
    assert_eq!(context.device.read_table(&other)?, framework::descriptors(&[7, 8]));
    Ok(())
}

#[test]
pub fn allocate_pool_is_idempotent() -> Result<()> {
    let mut context = framework::make_context();
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Sampler, 16, 0)?;
    let handle = context.cache.get_descriptor_pool(DescriptorPoolType::Sampler, 0).unwrap().handle();
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Sampler, 8, 0)?;
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Sampler, 16, 0)?;
    assert_eq!(context.cache.get_descriptor_pool(DescriptorPoolType::Sampler, 0).unwrap().handle(), handle);
    assert_eq!(context.device.stats()?.pools_allocated, 1);
    Ok(())
}

#[test]
pub fn allocate_larger_pool_moves_tables() -> Result<()> {
    let mut context = framework::make_context();
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Resource, 2, 0)?;
    let a = builder(0, &[5, 6])?;
    a.get_resource_table(&mut context.cache, None)?;
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Resource, 32, 0)?;

    assert_eq!(context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).unwrap().capacity(), 32);
    let table = a.get_resource_table(&mut context.cache, None)?;
    assert_eq!(context.device.read_table(&table)?, framework::descriptors(&[5, 6]));
    Ok(())
}

#[test]
pub fn zero_capacity_pool_fails() {
    let mut context = framework::make_context();
    let err = context
        .cache
        .allocate_descriptor_pool(DescriptorPoolType::Resource, 0, 0)
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ZeroCapacityPool)));
    assert!(context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).is_none());
}

#[test]
pub fn failed_growth_keeps_previous_state() -> Result<()> {
    let mut context = framework::make_context_with_memory_limit(6);
    context.cache.allocate_descriptor_pool(DescriptorPoolType::Resource, 4, 0)?;
    let a = builder(0, &[1, 2])?.get_resource_table(&mut context.cache, None)?;

    let err = builder(0, &[3, 4, 5])?
        .get_resource_table(&mut context.cache, None)
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::OutOfDescriptorMemory { .. })));

    let pool = context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).unwrap();
    assert_eq!(pool.capacity(), 4);
    assert_eq!(pool.generation(), 1);
    assert_eq!(context.cache.descriptor_count(DescriptorPoolType::Resource, 0), 2);
    assert_eq!(context.cache.cached_table_count(DescriptorPoolType::Resource), 1);
    context.cache.validate_table(&a)?;
    assert_eq!(context.device.live_pools()?, 1);

    // A smaller request still fits in the old pool.
    builder(0, &[3, 4])?.get_resource_table(&mut context.cache, None)?;
    assert_eq!(context.cache.descriptor_count(DescriptorPoolType::Resource, 0), 4);
    Ok(())
}

#[test]
pub fn reset_forgets_tables() -> Result<()> {
    let mut context = framework::make_context();
    let a = builder(0, &[1])?;
    let old = a.get_resource_table(&mut context.cache, None)?;
    builder_in_pool(0, &[2], 1)?.get_resource_table(&mut context.cache, None)?;

    context.cache.reset_descriptor_pool(DescriptorPoolType::Resource, 0);
    assert!(context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).is_none());
    assert_eq!(context.cache.descriptor_count(DescriptorPoolType::Resource, 0), 0);
    assert_eq!(context.cache.cached_table_count(DescriptorPoolType::Resource), 1);
    assert!(context.cache.validate_table(&old).is_err());

    let writes = context.device.stats()?.descriptor_writes;
    let new = a.get_resource_table(&mut context.cache, None)?;
    assert_eq!(context.device.stats()?.descriptor_writes, writes + 1);
    assert!(new.generation() > old.generation());
    Ok(())
}

#[test]
pub fn retired_pools_are_destroyed_after_frames() -> Result<()> {
    let mut context = framework::make_context_with_settings(|settings| {
        settings
            .initial_capacity(DescriptorPoolType::Resource, 1)
            .retire_frames(2)
    });
    let a = builder(0, &[1])?;
    let old = a.get_resource_table(&mut context.cache, None)?;
    builder(0, &[2])?.get_resource_table(&mut context.cache, None)?;
    assert_eq!(context.device.live_pools()?, 2, "Replaced pool should be kept alive for a while");
    assert_eq!(context.device.read_table(&old)?, framework::descriptors(&[1]));

    context.cache.next_frame();
    assert_eq!(context.device.live_pools()?, 2);
    context.cache.next_frame();
    assert_eq!(context.device.live_pools()?, 1);
    assert!(context.device.read_table(&old).is_err());
    Ok(())
}

#[test]
pub fn donor_table_is_reused() -> Result<()> {
    let mut context = framework::make_context();
    let donor = builder(0, &[1, 2, 3])?.get_resource_table(&mut context.cache, None)?;
    let used = context.cache.descriptor_count(DescriptorPoolType::Resource, 0);

    let table = builder(0, &[4, 5])?.create_resource_table(&mut context.cache, Some(&donor))?;
    assert_eq!(table.offset(), donor.offset());
    assert_eq!(table.handle(), donor.handle());
    assert_eq!(table.len(), 2);
    assert_eq!(context.cache.descriptor_count(DescriptorPoolType::Resource, 0), used);
    assert_eq!(context.device.read_table(&table)?, framework::descriptors(&[4, 5]));
    // The content that lived in the donor's slots is no longer cached.
    assert_eq!(context.cache.cached_table_count(DescriptorPoolType::Resource), 1);

    let err = builder(0, &[6, 7, 8, 9])?
        .create_resource_table(&mut context.cache, Some(&donor))
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::TableTooSmall { needed: 4, available: 3 })));
    Ok(())
}

#[test]
pub fn stale_donor_is_rejected() -> Result<()> {
    let mut context = framework::make_context();
    let donor = builder(0, &[1])?.get_resource_table(&mut context.cache, None)?;
    context.cache.reset_descriptor_pool(DescriptorPoolType::Resource, 0);
    let err = builder(0, &[2])?
        .create_resource_table(&mut context.cache, Some(&donor))
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::StaleTable { .. })));
    Ok(())
}

#[test]
pub fn empty_builder_is_rejected() {
    let mut context = framework::make_context();
    let err = DescriptorTableBuilder::new()
        .get_resource_table(&mut context.cache, None)
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyDescriptorTable)));
}

#[test]
pub fn pools_are_named() -> Result<()> {
    let mut context = framework::make_context();
    builder_in_pool(0, &[1], 2)?.get_resource_table(&mut context.cache, None)?;
    let pool = context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 2).unwrap().handle();
    assert_eq!(context.device.pool_name(pool)?.as_deref(), Some("test.ResourcePool2"));

    context.cache.set_name("renamed");
    assert_eq!(context.device.pool_name(pool)?.as_deref(), Some("renamed.ResourcePool2"));
    Ok(())
}

#[test]
pub fn strides_come_from_the_device() {
    let context = framework::make_context();
    for ty in DescriptorPoolType::ALL {
        assert_eq!(context.cache.get_descriptor_stride(ty), context.device.descriptor_stride(ty));
    }
}

#[test]
pub fn huge_pool_request_reports_out_of_memory() -> Result<()> {
    let mut context = framework::make_context();
    // Hosts with enough address space may satisfy the request, it must never abort.
    match context.cache.allocate_descriptor_pool(DescriptorPoolType::Resource, u32::MAX, 0) {
        Ok(()) => {
            let pool = context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).unwrap();
            assert_eq!(pool.capacity(), u32::MAX);
        }
        Err(err) => {
            assert!(matches!(err.downcast_ref::<Error>(), Some(Error::OutOfDescriptorMemory { .. })));
            assert!(context.cache.get_descriptor_pool(DescriptorPoolType::Resource, 0).is_none());
        }
    }

    let table = builder(0, &[1, 2])?.get_resource_table(&mut context.cache, None)?;
    assert_eq!(context.device.read_table(&table)?, framework::descriptors(&[1, 2]));
    Ok(())
}
