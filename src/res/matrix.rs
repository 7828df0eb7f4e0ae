use crate::res::error::{ResError, ResResult};


/// Matrix is a row-major 2D view over a flat vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}


impl<T: Copy> Matrix<T> {
    pub fn new(data: Vec<T>, width: usize, height: usize) -> ResResult<Self> {
        if data.len() != width * height {
            return Err(ResError::InvalidDimensions { width, height, len: data.len() });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Rotates by -90 degrees, the last column becomes the first row.
    ///
    /// ```text
    /// [1, 2, 3]      [3, 6, 9]
    /// [4, 5, 6]  ->  [2, 5, 8]
    /// [7, 8, 9]      [1, 4, 7]
    /// ```
    pub fn rotate(&self) -> Self {
        let (col, row) = (self.width, self.height);
        let data = (0..col * row)
            .map(|i| self.data[col * (i % row + 1) - 1 - i / row])
            .collect();

        Self { width: self.height, height: self.width, data }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_2x3() {
        let m = Matrix::new(vec![1, 2, 3, 4, 5, 6], 2, 3).unwrap();
        let r = m.rotate();
        assert_eq!((r.width(), r.height()), (3, 2));
        assert_eq!(r.data(), &[2, 4, 6, 1, 3, 5]);
    }

    #[test]
    fn rotate_3x4() {
        let m = Matrix::new((1..=12).collect::<Vec<u16>>(), 3, 4).unwrap();
        assert_eq!(m.rotate().into_data(), vec![3, 6, 9, 12, 2, 5, 8, 11, 1, 4, 7, 10]);
    }

    #[test]
    fn four_rotations_are_identity() {
        let m = Matrix::new((0..20).collect::<Vec<i32>>(), 5, 4).unwrap();
        assert_eq!(m.rotate().rotate().rotate().rotate(), m);
    }

    #[test]
    fn invalid_dimensions() {
        let err = Matrix::new(vec![1u16, 2, 3], 2, 2).unwrap_err();
        assert!(matches!(err, ResError::InvalidDimensions { width: 2, height: 2, len: 3 }));
    }

    #[test]
    fn empty_matrix() {
        let m = Matrix::<u16>::new(Vec::new(), 0, 0).unwrap();
        assert!(m.rotate().data().is_empty());
    }
}
