#![allow(missing_docs)]

use std::error::Error;
use std::num::NonZeroUsize;
use std::sync::Arc;

use slabstore::codec::BytesToBytesCodecTraits;
use slabstore::codec::bytes_to_bytes::{fletcher32::Fletcher32Codec, shuffle::ShuffleCodec};
use slabstore::dataset::{
    AllocationTime, DataType, Dataset, DatasetBuilder, DatasetCreateError, StorageLayout,
};
use slabstore::dataspace::{ArraySubset, MaxExtent, Selection};
use slabstore::storage::{StorageBackend, backend::FilesystemBackend};

#[test]
fn dataset_filesystem_close_open() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let backend = Arc::new(FilesystemBackend::new(path.path())?);
    let dataset = DatasetBuilder::new(vec![10, 10], DataType::UINT16)
        .max_shape(vec![MaxExtent::Unlimited, MaxExtent::Bounded(20)])
        .chunk_shape(vec![4, 4])
        .fill_value(7u16)
        .codecs(vec![
            Arc::new(ShuffleCodec::new(NonZeroUsize::new(2).ok_or("zero element size")?))
                as Arc<dyn BytesToBytesCodecTraits>,
            Arc::new(Fletcher32Codec::new()),
        ])
        .build(backend)?;
    let elements: Vec<u16> = (0..100).collect();
    let all = dataset.dataspace().select_all();
    dataset.write_elements(&all, &elements)?;
    dataset.close()?;

    let backend = Arc::new(FilesystemBackend::new(path.path())?);
    let mut dataset = Dataset::open(backend)?;
    assert_eq!(dataset.shape(), &[10, 10]);
    assert_eq!(
        dataset.max_shape(),
        &[MaxExtent::Unlimited, MaxExtent::Bounded(20)]
    );
    assert_eq!(dataset.codecs(), vec!["shuffle", "fletcher32"]);
    assert_eq!(dataset.fill_value().as_bytes(), &7u16.to_ne_bytes());
    assert_eq!(dataset.read_elements::<u16>(&all)?, elements);

    dataset.resize(&[12, 20])?;
    let tail = Selection::new_with_subset(vec![12, 20], &ArraySubset::from([10..12, 0..20]))?;
    assert_eq!(dataset.read_elements::<u16>(&tail)?, vec![7; 40]);
    dataset.close()?;

    let dataset = Dataset::open(Arc::new(FilesystemBackend::new(path.path())?))?;
    assert_eq!(dataset.shape(), &[12, 20]);
    let head = Selection::new_with_subset(vec![12, 20], &ArraySubset::from([0..1, 0..10]))?;
    assert_eq!(
        dataset.read_elements::<u16>(&head)?,
        (0..10).collect::<Vec<u16>>()
    );
    Ok(())
}

#[test]
fn dataset_filesystem_flush_on_drop() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    {
        let dataset = DatasetBuilder::new(vec![8], DataType::FLOAT64)
            .chunk_shape(vec![3])
            .build(Arc::new(FilesystemBackend::new(path.path())?))?;
        dataset.write_elements(&dataset.dataspace().select_all(), &[0.5f64; 8])?;
    }

    let dataset = Dataset::open(Arc::new(FilesystemBackend::new(path.path())?))?;
    assert_eq!(
        dataset.read_elements::<f64>(&dataset.dataspace().select_all())?,
        vec![0.5; 8]
    );
    assert_eq!(dataset.chunk_store().num_allocated(), 3);
    Ok(())
}

#[test]
fn dataset_filesystem_compact() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let dataset = DatasetBuilder::new(vec![3, 3], DataType::INT8)
        .layout(StorageLayout::Compact)
        .fill_value(-1i8)
        .build(Arc::new(FilesystemBackend::new(path.path())?))?;
    let corner = Selection::new_with_subset(vec![3, 3], &ArraySubset::from([1..3, 1..3]))?;
    dataset.write_elements(&corner, &[1i8, 2, 3, 4])?;
    dataset.close()?;

    let backend = Arc::new(FilesystemBackend::new(path.path())?);
    assert_eq!(backend.size()?, 0);
    let dataset = Dataset::open(backend)?;
    assert_eq!(dataset.layout(), StorageLayout::Compact);
    assert_eq!(
        dataset.read_elements::<i8>(&dataset.dataspace().select_all())?,
        vec![-1, -1, -1, -1, 1, 2, -1, 3, 4]
    );
    Ok(())
}

#[test]
fn dataset_filesystem_early_allocation() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let dataset = DatasetBuilder::new(vec![4, 4], DataType::UINT32)
        .chunk_shape(vec![2, 2])
        .allocation_time(AllocationTime::Early)
        .build(Arc::new(FilesystemBackend::new(path.path())?))?;
    let storage_size = dataset.storage_size();
    assert_eq!(storage_size, 4 * 4 * 4);
    dataset.close()?;

    let dataset = Dataset::open(Arc::new(FilesystemBackend::new(path.path())?))?;
    assert_eq!(dataset.chunk_store().num_allocated(), 4);
    assert_eq!(dataset.storage_size(), storage_size);
    assert_eq!(
        dataset.read_elements::<u32>(&dataset.dataspace().select_all())?,
        vec![0; 16]
    );
    Ok(())
}

#[test]
fn dataset_open_invalid_metadata() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let backend = Arc::new(FilesystemBackend::new(path.path())?);
    assert!(matches!(
        Dataset::open(backend.clone()),
        Err(DatasetCreateError::MissingMetadata)
    ));

    std::fs::write(path.path().join("dataset.json"), b"{\"version\": 1")?;
    assert!(matches!(
        Dataset::open(backend),
        Err(DatasetCreateError::InvalidMetadata(_))
    ));
    Ok(())
}
