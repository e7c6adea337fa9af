use crate::error::DimensionTooLargerError;

pub trait SafeConversion: TryInto<usize> + TryInto<u64> {
    fn try_usize(self) -> Result<usize, DimensionTooLargerError> {
        self.try_into().map_err(|_| DimensionTooLargerError)
    }

    fn try_u64(self) -> Result<u64, DimensionTooLargerError> {
        self.try_into().map_err(|_| DimensionTooLargerError)
    }
}

impl SafeConversion for usize {}
impl SafeConversion for u32 {}

/// Checked arithmetic that reports overflow as [`DimensionTooLargerError`]
pub trait SafeMath: Sized {
    fn sadd(self, rhs: Self) -> Result<Self, DimensionTooLargerError>;
    fn smul(self, rhs: Self) -> Result<Self, DimensionTooLargerError>;
}

macro_rules! impl_safe_math {
    ($($t:ty),*) => {
        $(
            impl SafeMath for $t {
                fn sadd(self, rhs: Self) -> Result<Self, DimensionTooLargerError> {
                    self.checked_add(rhs).ok_or(DimensionTooLargerError)
                }

                fn smul(self, rhs: Self) -> Result<Self, DimensionTooLargerError> {
                    self.checked_mul(rhs).ok_or(DimensionTooLargerError)
                }
            }
        )*
    };
}

impl_safe_math!(u64, usize);
