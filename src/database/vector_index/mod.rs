
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{RagError, Result};

const TABLE_NAME: &str = "chunks";
const POSITION_COLUMN: &str = "position";
const VECTOR_COLUMN: &str = "vector";
const DISTANCE_COLUMN: &str = "_distance";

/// One ranked hit: the vector's build position and its L2 distance to the
/// query (squared Euclidean, as reported by LanceDB)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Exact L2 nearest-neighbor index over vectors stored in LanceDB.
///
/// Vectors are addressed by the order in which they were appended: the
/// first vector is position 0. The index is append-only while building and
/// read-only once opened.
#[derive(Clone)]
pub struct VectorIndex {
    table: Table,
    dimension: usize,
    len: usize,
}

impl std::fmt::Debug for VectorIndex {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Create an empty index at `path`, replacing any index already there
    #[inline]
    pub async fn create(path: &Path, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config(
                "Vector dimension must be greater than 0".to_string(),
            ));
        }

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Index(format!(
                "Failed to create vector index directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let connection = connect(path).await?;
        drop_table_if_exists(&connection).await?;

        let table = connection
            .create_empty_table(TABLE_NAME, create_schema(dimension))
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to create table: {}", e)))?;

        info!(
            "Created vector index at {} with {} dimensions",
            path.display(),
            dimension
        );

        Ok(Self {
            table,
            dimension,
            len: 0,
        })
    }

    /// Create an index at `path` holding `vectors` at positions 0..n
    #[inline]
    pub async fn build(path: &Path, dimension: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::create(path, dimension).await?;
        index.append(vectors).await?;
        Ok(index)
    }

    /// Open a previously built index
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(RagError::NotFound(format!(
                "Vector index not found at {}",
                path.display()
            )));
        }

        let connection = connect(path).await.map_err(|e| {
            RagError::NotFound(format!("Vector index at {} is unreadable: {}", path.display(), e))
        })?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::NotFound(format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Err(RagError::NotFound(format!(
                "Vector index at {} has no '{}' table",
                path.display(),
                TABLE_NAME
            )));
        }

        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::NotFound(format!("Failed to open vector table: {}", e)))?;

        let dimension = detect_vector_dimension(&table).await?;
        let len = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::NotFound(format!("Failed to count vectors: {}", e)))?;

        debug!(
            "Opened vector index at {} ({} vectors, {} dimensions)",
            path.display(),
            len,
            dimension
        );

        Ok(Self {
            table,
            dimension,
            len,
        })
    }

    /// Number of vectors in the index
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of every vector in the index
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Append `vectors`; they receive the next positions in order
    #[inline]
    pub async fn append(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.is_empty() {
            debug!("No vectors to append");
            return Ok(());
        }

        self.check_dimensions(vectors)?;

        let record_batch = self.create_record_batch(vectors)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to insert vectors: {}", e)))?;

        self.len += vectors.len();
        debug!("Appended {} vectors, index now holds {}", vectors.len(), self.len);
        Ok(())
    }

    /// Reject any vector whose width differs from the index dimension
    #[inline]
    pub fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            self.check_dimension(vector)?;
        }
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(RagError::Config(format!(
                "Vector has {} dimensions but the index expects {}",
                vector.len(),
                self.dimension
            )))
        }
    }

    /// Return the `min(k, len)` vectors closest to `query_vector`, nearest
    /// first. Ties are broken by position.
    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query_vector)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let limit = k.min(self.len);
        debug!("Searching for {} nearest of {} vectors", limit, self.len);

        let mut results = self
            .table
            .vector_search(query_vector)
            .map_err(|e| RagError::Index(format!("Failed to create vector search: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::L2)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to execute search: {}", e)))?;

        let mut neighbors = Vec::with_capacity(limit);
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Index(format!("Failed to read result stream: {}", e)))?
        {
            neighbors.extend(parse_search_batch(&batch)?);
        }

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        neighbors.truncate(k);

        debug!("Search returned {} neighbors", neighbors.len());
        Ok(neighbors)
    }

    /// Count rows as stored on disk, independent of the cached length
    #[inline]
    pub async fn count_rows(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Index(format!("Failed to count rows: {}", e)))
    }

    /// Create a RecordBatch for vectors starting at the next free position
    fn create_record_batch(&self, vectors: &[Vec<f32>]) -> Result<RecordBatch> {
        let start = self.len as u64;
        let positions: Vec<u64> = (start..start + vectors.len() as u64).collect();

        let mut flat_values = Vec::with_capacity(vectors.len() * self.dimension);
        for vector in vectors {
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| RagError::Index(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt64Array::from(positions)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(create_schema(self.dimension), arrays)
            .map_err(|e| RagError::Index(format!("Failed to create record batch: {}", e)))
    }
}

async fn connect(path: &Path) -> Result<Connection> {
    let uri = path.to_string_lossy();
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| RagError::Index(format!("Failed to connect to LanceDB: {}", e)))
}

async fn drop_table_if_exists(connection: &Connection) -> Result<()> {
    let table_names = connection
        .table_names()
        .execute()
        .await
        .map_err(|e| RagError::Index(format!("Failed to list tables for drop: {}", e)))?;

    if table_names.iter().any(|name| name == TABLE_NAME) {
        info!("Dropping existing vector table");
        connection
            .drop_table(TABLE_NAME)
            .await
            .map_err(|e| RagError::Index(format!("Failed to drop table: {}", e)))?;
    }

    Ok(())
}

fn create_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(POSITION_COLUMN, DataType::UInt64, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
    ]))
}

/// Read the vector width from the table schema
async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::NotFound(format!("Failed to read vector table schema: {}", e)))?;

    for field in schema.fields() {
        if field.name() == VECTOR_COLUMN {
            if let DataType::FixedSizeList(_, size) = field.data_type() {
                return Ok(*size as usize);
            }
        }
    }

    Err(RagError::NotFound(
        "Vector table has no fixed-size vector column".to_string(),
    ))
}

/// Pair every returned position with the distance in the same row
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<Neighbor>> {
    let positions = batch
        .column_by_name(POSITION_COLUMN)
        .ok_or_else(|| RagError::Index("Missing position column".to_string()))?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| RagError::Index("Invalid position column type".to_string()))?;

    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .ok_or_else(|| RagError::Index("Missing distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| RagError::Index("Invalid distance column type".to_string()))?;

    Ok((0..batch.num_rows())
        .map(|row| Neighbor {
            position: positions.value(row) as usize,
            distance: distances.value(row),
        })
        .collect())
}
